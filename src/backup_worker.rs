use crate::errors::AppError;
use crate::repository::{FoldersRepository, PhotosRepository, ServerRepository};
use crate::settings::Settings;
use crate::upload_worker::{FailReason, UploadOutcome};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Newest photos considered per backup folder and cycle.
pub const BACKUP_BATCH_SIZE: i64 = 100;

pub struct BackupWorker {
    folders: Arc<FoldersRepository>,
    photos: Arc<PhotosRepository>,
    server: Arc<ServerRepository>,
    settings: Arc<Settings>,
    interval: Duration,
}

impl BackupWorker {
    pub fn new(
        folders: Arc<FoldersRepository>,
        photos: Arc<PhotosRepository>,
        server: Arc<ServerRepository>,
        settings: Arc<Settings>,
        interval: Duration,
    ) -> Self {
        Self {
            folders,
            photos,
            server,
            settings,
            interval,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!("BackupWorker: Started (every {:?}).", self.interval);
        loop {
            if cancel.is_cancelled() {
                info!("BackupWorker received shutdown signal");
                break;
            }

            match self.settings.auto_backup() {
                Ok(true) => {
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => UploadOutcome::Failure(FailReason::Cancelled),
                        outcome = self.backup_once() => outcome,
                    };
                    debug!("BackupWorker: cycle finished with {:?}", outcome);
                }
                Ok(false) => debug!("BackupWorker: auto backup disabled, skipping cycle."),
                Err(e) => error!("BackupWorker: failed to read settings: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("BackupWorker received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Refresh the device library, then upload what the backup folders are
    /// missing on the server. Uploads are private and go to the default
    /// server folder.
    pub async fn backup_once(&self) -> UploadOutcome {
        self.folders.update_phone_albums().await;

        let folder_names = match self.folders.backup_folders() {
            Ok(names) => names,
            Err(e) => {
                error!("BackupWorker: failed to load backup folders: {}", e);
                return UploadOutcome::Failure(FailReason::Other);
            }
        };

        let mut succeeded = 0;
        let mut failed = 0;
        for folder in folder_names {
            info!("BackupWorker: Backing up folder: {}", folder);
            let photos = match self.photos.photos_not_backed_up(&folder, BACKUP_BATCH_SIZE) {
                Ok(photos) => photos,
                Err(e) => {
                    error!("BackupWorker: failed to list {}: {}", folder, e);
                    return UploadOutcome::Failure(FailReason::Other);
                }
            };

            for photo in photos {
                match self.server.upload_file(&photo, false, None).await {
                    Ok(true) => succeeded += 1,
                    Ok(false) => failed += 1,
                    Err(e) if e.is_transient() => {
                        warn!("BackupWorker: server unreachable, retrying next cycle: {}", e);
                        return UploadOutcome::Retry;
                    }
                    Err(AppError::NotLoggedIn) => {
                        warn!("BackupWorker: not logged in, backup stopped");
                        return UploadOutcome::Failure(FailReason::Other);
                    }
                    Err(e) => {
                        error!("BackupWorker: upload of {} failed: {}", photo.id, e);
                        return UploadOutcome::Failure(FailReason::Other);
                    }
                }
            }
        }

        info!("BackupWorker: {} uploaded, {} failed", succeeded, failed);
        UploadOutcome::Success { succeeded, failed }
    }
}
