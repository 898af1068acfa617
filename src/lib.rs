pub mod api;
pub mod backup_worker;
pub mod config;
pub mod database;
pub mod errors;
pub mod exif_cache;
pub mod media_store;
pub mod metadata;
pub mod models;
pub mod refresh;
pub mod repository;
pub mod session;
pub mod settings;
pub mod upload_worker;
pub mod watcher;

#[cfg(test)]
mod test_support;

use api::{HttpPhotosApi, PhotosApi};
use backup_worker::BackupWorker;
use config::ClientConfig;
use database::Database;
use errors::AppResult;
use exif_cache::ExifCache;
use media_store::FsMediaStore;
use refresh::RefreshPhotos;
use repository::{FoldersRepository, PhotosRepository, ServerRepository};
use session::Session;
use settings::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use upload_worker::UploadWorker;
use watcher::MediaWatcher;

/// Everything a front end needs, wired from one `ClientConfig`.
pub struct PhotosClient {
    pub config: ClientConfig,
    pub db: Arc<Database>,
    pub api: Arc<dyn PhotosApi>,
    pub session: Arc<Session>,
    pub settings: Arc<Settings>,
    pub folders: Arc<FoldersRepository>,
    pub photos: Arc<PhotosRepository>,
    pub server: Arc<ServerRepository>,
    pub refresh: Arc<RefreshPhotos>,
}

impl PhotosClient {
    pub fn open(config: ClientConfig) -> AppResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.database_path();
        let db = Arc::new(Database::new(&db_path)?);
        log::info!("Database initialized at {:?}", db_path);

        let api: Arc<dyn PhotosApi> = Arc::new(HttpPhotosApi::new(
            &config.server_url,
            config.accept_invalid_certs,
        )?);
        let session = Arc::new(Session::new(db.clone(), api.clone()));
        if session.restore()? {
            log::info!("Restored session for {:?}", session.user_id()?);
        }

        let settings = Arc::new(Settings::new(db.clone()));
        let exif_cache = ExifCache::new(settings.exif_cache_capacity()?);

        let media_store = Arc::new(FsMediaStore::new(
            config.media_dirs.clone(),
            config.download_dir.clone(),
        ));
        let folders = Arc::new(FoldersRepository::new(db.clone(), media_store.clone()));
        let photos = Arc::new(PhotosRepository::new(db.clone()));
        let server = Arc::new(ServerRepository::new(
            api.clone(),
            db.clone(),
            media_store,
            exif_cache,
        ));
        let refresh = Arc::new(RefreshPhotos::new(
            api.clone(),
            folders.clone(),
            server.clone(),
            photos.clone(),
        ));

        Ok(Self {
            config,
            db,
            api,
            session,
            settings,
            folders,
            photos,
            server,
            refresh,
        })
    }

    pub fn upload_worker(&self) -> UploadWorker {
        UploadWorker::new(self.photos.clone(), self.server.clone())
    }

    pub fn backup_worker(&self) -> BackupWorker {
        BackupWorker::new(
            self.folders.clone(),
            self.photos.clone(),
            self.server.clone(),
            self.settings.clone(),
            self.config.backup_interval,
        )
    }

    pub fn start_watcher(&self, debounce: Duration, cancel: CancellationToken) -> AppResult<MediaWatcher> {
        MediaWatcher::start(&self.config.media_dirs, self.folders.clone(), debounce, cancel)
    }
}
