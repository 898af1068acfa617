use crate::api::{PhotosApi, PingResponse};
use crate::errors::AppError;
use crate::repository::{FoldersRepository, PhotosRepository, ServerRepository};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub enum RefreshResult {
    Success,
    /// The session expired and the caller should log out.
    NotLoggedIn,
    Error(AppError),
}

/// One full refresh cycle: device library, server mirror, link repair.
pub struct RefreshPhotos {
    api: Arc<dyn PhotosApi>,
    folders: Arc<FoldersRepository>,
    server: Arc<ServerRepository>,
    photos: Arc<PhotosRepository>,
    online: watch::Sender<bool>,
}

impl RefreshPhotos {
    pub fn new(
        api: Arc<dyn PhotosApi>,
        folders: Arc<FoldersRepository>,
        server: Arc<ServerRepository>,
        photos: Arc<PhotosRepository>,
    ) -> Self {
        let (online, _) = watch::channel(false);
        Self {
            api,
            folders,
            server,
            photos,
            online,
        }
    }

    /// Whether the last ping reached the server.
    pub fn subscribe_online(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub async fn run(&self) -> RefreshResult {
        let ping = self.api.ping().await;
        if ping == PingResponse::NotLoggedIn {
            log::warn!("RefreshPhotos: session is no longer valid");
            return RefreshResult::NotLoggedIn;
        }

        let online = ping == PingResponse::Successful;
        self.online.send_replace(online);
        log::info!("RefreshPhotos: starting refresh (online: {})", online);

        let local = self.folders.update_phone_albums();
        let remote = async {
            if !online {
                return Ok(());
            }
            self.server.download_all_photos().await?;
            self.photos.repair_dangling_references()?;
            Ok::<(), AppError>(())
        };

        let (_, remote) = tokio::join!(local, remote);
        match remote {
            Ok(()) => RefreshResult::Success,
            Err(AppError::NotLoggedIn) => RefreshResult::NotLoggedIn,
            Err(e) => {
                log::error!("RefreshPhotos: remote refresh failed: {}", e);
                RefreshResult::Error(e)
            }
        }
    }
}
