use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use family_photos::config::ClientConfig;
use family_photos::models::{FolderType, UserLogin};
use family_photos::refresh::RefreshResult;
use family_photos::upload_worker::{UploadEvent, UploadJob, UploadOutcome};
use family_photos::watcher::DEFAULT_DEBOUNCE;
use family_photos::PhotosClient;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FolderFilter {
    All,
    Personal,
    Public,
}

impl From<FolderFilter> for FolderType {
    fn from(filter: FolderFilter) -> Self {
        match filter {
            FolderFilter::All => FolderType::All,
            FolderFilter::Personal => FolderType::Personal,
            FolderFilter::Public => FolderType::Public,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the photo server
    Login {
        user_id: String,
        #[arg(long, env = "FAMILY_PHOTOS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and forget the session
    Logout,
    /// Rescan the device library and mirror the server listing
    Refresh,
    /// List device folders, or server folders with --network
    Folders {
        #[arg(long)]
        network: bool,
        /// Server folder filter, saved as the default
        #[arg(long, value_enum)]
        r#type: Option<FolderFilter>,
        /// Sort order, saved as the default
        #[arg(long)]
        descending: Option<bool>,
    },
    /// List photos
    Photos {
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        network: bool,
        #[arg(long, conflicts_with_all = ["folder", "memories"])]
        favorites: bool,
        /// Server photos taken on previous years, grouped by years ago
        #[arg(long)]
        memories: bool,
    },
    /// Mark or unmark a server photo as favorite
    Favorite {
        id: i64,
        #[arg(long)]
        remove: bool,
    },
    /// Upload device photos by id
    Upload {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        public: bool,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Save a server photo to the device
    Download { id: i64 },
    /// Delete a server photo
    Delete { id: i64 },
    /// Move a server photo to another folder or visibility
    Move {
        id: i64,
        #[arg(long)]
        public: bool,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Move every photo of a server folder
    RenameFolder {
        source: String,
        target: Option<String>,
        #[arg(long)]
        source_public: bool,
        #[arg(long)]
        target_public: bool,
    },
    /// Groups of server photos the server considers duplicates
    Duplicates,
    /// EXIF tags of a server photo, or of a device photo with --local
    Exif {
        id: i64,
        #[arg(long)]
        local: bool,
    },
    /// Add or remove a device folder from automatic backup
    BackupFolder {
        folder: String,
        #[arg(long)]
        disable: bool,
    },
    /// Back up the selected device folders
    Backup {
        /// Keep running and back up on the configured interval
        #[arg(long)]
        daemon: bool,
    },
    /// Refresh the device library whenever the media folders change
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl-C, shutting down");
            token.cancel();
        }
    });
    cancel
}

fn require_login(client: &PhotosClient) -> Result<()> {
    if !client.session.is_logged_in()? {
        bail!("Not logged in, run `family-photos login <user>` first");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    let client = PhotosClient::open(config).context("Failed to open photo library")?;

    match cli.command {
        Commands::Login { user_id, password } => {
            let user = client.session.login(&UserLogin { user_id, password }).await?;
            println!("Logged in as {} ({})", user.display_name, user.user_id);
        }
        Commands::Logout => {
            client.session.logout().await?;
            println!("Logged out");
        }
        Commands::Refresh => match client.refresh.run().await {
            RefreshResult::Success => println!("Library refreshed (online: {})", client.refresh.is_online()),
            RefreshResult::NotLoggedIn => {
                client.session.clear()?;
                bail!("Session expired, log in again");
            }
            RefreshResult::Error(e) => return Err(e).context("Refresh failed"),
        },
        Commands::Folders {
            network,
            r#type,
            descending,
        } => {
            if let Some(descending) = descending {
                client.settings.set_show_folders_ascending(!descending)?;
            }
            if let Some(filter) = r#type {
                client.settings.set_folder_type(filter.into())?;
            }
            let ascending = client.settings.show_folders_ascending()?;
            if network {
                let folder_type = client.settings.folder_type()?;
                print_json(&client.folders.network_folders(ascending, folder_type)?)?;
            } else {
                print_json(&client.folders.local_folders(ascending)?)?;
            }
        }
        Commands::Photos {
            folder,
            network,
            favorites,
            memories,
        } => {
            if memories {
                let user_id = client.session.user_id()?;
                let now = time::OffsetDateTime::now_utc().unix_timestamp();
                print_json(&client.photos.memories(user_id.as_deref(), now)?)?;
            } else if favorites {
                print_json(&client.photos.favorite_photos()?)?;
            } else if network {
                match folder {
                    Some(folder) => print_json(&client.folders.network_photos_from_folder(&folder)?)?,
                    None => print_json(&client.photos.network_photos(-1, 0)?)?,
                }
            } else {
                match folder {
                    Some(folder) => print_json(&client.folders.local_photos_from_folder(&folder)?)?,
                    None => print_json(&client.photos.local_photos()?)?,
                }
            }
        }
        Commands::Favorite { id, remove } => {
            require_login(&client)?;
            client.server.update_favorite(id, !remove).await?;
            println!("Photo {} {}", id, if remove { "unmarked" } else { "marked as favorite" });
        }
        Commands::Upload { ids, public, folder } => {
            require_login(&client)?;
            let (tx, mut rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        UploadEvent::Started { .. } => log::info!("{}", event.message()),
                        _ => println!("{}", event.message()),
                    }
                }
            });

            let worker = client.upload_worker().with_events(tx);
            let outcome = worker
                .run(UploadJob::new(ids, public, folder.as_deref()), cancel_on_ctrl_c())
                .await;
            drop(worker);
            printer.await?;

            match outcome {
                UploadOutcome::Success { .. } => {}
                UploadOutcome::Retry => bail!("Server unreachable, try again later"),
                UploadOutcome::Failure(reason) => bail!("Upload failed: {:?}", reason),
            }
        }
        Commands::Download { id } => {
            require_login(&client)?;
            let photo = client
                .photos
                .network_photo(id)?
                .with_context(|| format!("Unknown server photo {}, try `refresh` first", id))?;
            let local = client.server.save_network_photo_to_storage(&photo).await?;
            println!("Saved {} to {}", photo.name, local.uri);
        }
        Commands::Delete { id } => {
            require_login(&client)?;
            client.server.delete_network_photo(id).await?;
            println!("Deleted photo {}", id);
        }
        Commands::Move { id, public, folder } => {
            require_login(&client)?;
            let photo = client
                .photos
                .network_photo(id)?
                .with_context(|| format!("Unknown server photo {}, try `refresh` first", id))?;
            let folder = folder.as_deref().map(str::trim).filter(|f| !f.is_empty());
            let moved = client.server.change_photo_location(&photo, public, folder).await?;
            print_json(&moved)?;
        }
        Commands::RenameFolder {
            source,
            target,
            source_public,
            target_public,
        } => {
            require_login(&client)?;
            let target = target.as_deref().map(str::trim).filter(|f| !f.is_empty());
            let moved = client
                .server
                .rename_network_folder(source_public, &source, target_public, target)
                .await?;
            println!("Moved {} photos", moved);
        }
        Commands::Duplicates => {
            require_login(&client)?;
            print_json(&client.server.get_duplicates().await?)?;
        }
        Commands::Exif { id, local } => {
            let exif = if local {
                client.folders.local_exif_data(id).await?
            } else {
                require_login(&client)?;
                client.server.get_exif_data(id).await?
            };
            for (tag, value) in exif.sorted() {
                println!("{}: {}", tag, value);
            }
        }
        Commands::BackupFolder { folder, disable } => {
            client.folders.set_backup_folder(&folder, !disable)?;
            print_json(&client.folders.backup_folders()?)?;
        }
        Commands::Backup { daemon } => {
            require_login(&client)?;
            let worker = client.backup_worker();
            if daemon {
                client.settings.set_auto_backup(true)?;
                worker.run(cancel_on_ctrl_c()).await;
            } else {
                match worker.backup_once().await {
                    UploadOutcome::Success { succeeded, failed } => {
                        println!("{}", UploadEvent::Finished { succeeded, failed }.message())
                    }
                    UploadOutcome::Retry => bail!("Server unreachable, try again later"),
                    UploadOutcome::Failure(reason) => bail!("Backup failed: {:?}", reason),
                }
            }
        }
        Commands::Watch => {
            let cancel = cancel_on_ctrl_c();
            client.folders.update_phone_albums().await;
            let watcher = client.start_watcher(DEFAULT_DEBOUNCE, cancel)?;
            watcher.join().await;
        }
    }

    Ok(())
}
