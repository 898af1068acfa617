use crate::errors::AppResult;
use crate::media_store::{is_hidden, is_temporary_file, media_mime_type};
use crate::repository::FoldersRepository;
use log::{debug, info};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Quiet period after the last change before the library is rescanned.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Watches the media roots and refreshes the local table when they change.
pub struct MediaWatcher {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl MediaWatcher {
    pub fn start(
        roots: &[PathBuf],
        folders: Arc<FoldersRepository>,
        debounce: Duration,
        cancel: CancellationToken,
    ) -> AppResult<Self> {
        let (tx, rx) = mpsc::channel(100);

        let watcher_config = Config::default().with_poll_interval(Duration::from_secs(2));
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = tx.blocking_send(event);
                }
            },
            watcher_config,
        )?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!("Watcher started on {:?}", root);
        }

        let task = tokio::spawn(refresh_on_change(rx, folders, debounce, cancel));
        Ok(Self { watcher, task })
    }

    /// Wait until the watcher has been cancelled.
    pub async fn join(self) {
        let MediaWatcher { watcher, task } = self;
        if let Err(e) = task.await {
            log::error!("Watcher task failed: {}", e);
        }
        drop(watcher);
    }
}

fn is_relevant_path(path: &Path) -> bool {
    if is_hidden(path) || is_temporary_file(path) {
        return false;
    }
    // Directories carry no extension; their removal drops every photo below.
    media_mime_type(path).is_some() || path.extension().is_none()
}

fn is_relevant(event: &Event) -> bool {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            event.paths.iter().any(|p| is_relevant_path(p))
        }
        _ => false,
    }
}

async fn refresh_on_change(
    mut rx: mpsc::Receiver<Event>,
    folders: Arc<FoldersRepository>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                None => break,
                Some(event) if !is_relevant(&event) => continue,
                Some(event) => debug!("Watcher: change detected {:?}", event.paths),
            },
        }

        // Coalesce bursts (a camera import writes many files at once).
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(debounce) => break,
                event = rx.recv() => {
                    if event.is_none() {
                        break;
                    }
                }
            }
        }

        info!("Watcher: media changed, refreshing local library");
        folders.update_phone_albums().await;
    }
    info!("Watcher stopped");
}
