use crate::errors::{AppError, AppResult};
use crate::repository::{PhotosRepository, ServerRepository};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A batch of device photos to upload with shared destination settings.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub local_photo_ids: Vec<i64>,
    pub make_public: bool,
    /// `None` keeps the server's default folder.
    pub upload_folder: Option<String>,
}

impl UploadJob {
    pub fn new(local_photo_ids: Vec<i64>, make_public: bool, upload_folder: Option<&str>) -> Self {
        let upload_folder = upload_folder
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        Self {
            local_photo_ids,
            make_public,
            upload_folder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailReason {
    Cancelled,
    NoInternet,
    Other,
}

/// Progress notifications for whoever started the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UploadEvent {
    Started { total: usize },
    Progress { done: usize, total: usize, local_photo_id: i64 },
    Finished { succeeded: usize, failed: usize },
    Failed { reason: FailReason, message: Option<String> },
}

impl UploadEvent {
    /// One line suitable for a status bar or notification.
    pub fn message(&self) -> String {
        match self {
            UploadEvent::Started { .. } => "Starting upload".to_string(),
            UploadEvent::Progress { done, total, .. } => format!("Uploaded {}/{} files", done, total),
            UploadEvent::Finished { succeeded, failed } => match (succeeded, failed) {
                (0, failed) => format!("Failed to upload {} files", failed),
                (succeeded, 0) => format!("Uploaded {} files", succeeded),
                (succeeded, failed) => format!("Uploaded {} files, {} failed", succeeded, failed),
            },
            UploadEvent::Failed { reason, message } => match (reason, message) {
                (_, Some(message)) => format!("Backup failed: {}", message),
                (FailReason::Cancelled, None) => "Backup cancelled".to_string(),
                (FailReason::NoInternet, None) => "Backup failed: no internet connection".to_string(),
                (FailReason::Other, None) => "Backup failed".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { succeeded: usize, failed: usize },
    /// Connectivity dropped; run the job again later.
    Retry,
    Failure(FailReason),
}

pub struct UploadWorker {
    photos: Arc<PhotosRepository>,
    server: Arc<ServerRepository>,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl UploadWorker {
    pub fn new(photos: Arc<PhotosRepository>, server: Arc<ServerRepository>) -> Self {
        Self {
            photos,
            server,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    pub async fn run(&self, job: UploadJob, cancel: CancellationToken) -> UploadOutcome {
        info!(
            "UploadWorker: uploading {} photos (public: {}, folder: {:?})",
            job.local_photo_ids.len(),
            job.make_public,
            job.upload_folder
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(None),
            result = self.upload_all(&job) => result.map_err(Some),
        };

        match outcome {
            Ok((succeeded, failed)) => {
                self.emit(UploadEvent::Finished { succeeded, failed });
                UploadOutcome::Success { succeeded, failed }
            }
            Err(None) => {
                warn!("UploadWorker: cancelled");
                self.emit(UploadEvent::Failed {
                    reason: FailReason::Cancelled,
                    message: None,
                });
                UploadOutcome::Failure(FailReason::Cancelled)
            }
            Err(Some(e)) if e.is_transient() => {
                warn!("UploadWorker: server unreachable, will retry: {}", e);
                self.emit(UploadEvent::Failed {
                    reason: FailReason::NoInternet,
                    message: None,
                });
                UploadOutcome::Retry
            }
            Err(Some(e)) => {
                error!("UploadWorker: upload job failed: {}", e);
                self.emit(UploadEvent::Failed {
                    reason: FailReason::Other,
                    message: Some(e.to_string()),
                });
                UploadOutcome::Failure(FailReason::Other)
            }
        }
    }

    /// Photos that no longer exist or are already uploaded are dropped from
    /// the total instead of counting as failures.
    async fn upload_all(&self, job: &UploadJob) -> AppResult<(usize, usize)> {
        let mut total = job.local_photo_ids.len();
        let mut done = 0;
        let mut failed = 0;
        self.emit(UploadEvent::Started { total });

        for &id in &job.local_photo_ids {
            let photo = match self.photos.local_photo(id)? {
                Some(photo) if !photo.is_saved_to_cloud() => photo,
                _ => {
                    total -= 1;
                    continue;
                }
            };

            self.emit(UploadEvent::Progress {
                done,
                total,
                local_photo_id: id,
            });

            match self
                .server
                .upload_file(&photo, job.make_public, job.upload_folder.as_deref())
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    error!("UploadWorker: failed to upload {}", id);
                    failed += 1;
                }
                Err(e) if e.is_transient() || matches!(e, AppError::NotLoggedIn) => return Err(e),
                Err(e) => {
                    error!("UploadWorker: error while uploading {}: {}", id, e);
                    failed += 1;
                }
            }
            done += 1;
        }

        Ok((total - failed, failed))
    }
}
