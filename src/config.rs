use crate::errors::{AppError, AppResult};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR_NAME: &str = "family-photos";
const DEFAULT_SERVER_URL: &str = "http://localhost:5000/";
const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 60 * 60 * 6;
const DATABASE_FILE_NAME: &str = "library.db";

pub const ENV_SERVER_URL: &str = "FAMILY_PHOTOS_SERVER_URL";
pub const ENV_DATA_DIR: &str = "FAMILY_PHOTOS_DATA_DIR";
pub const ENV_MEDIA_DIRS: &str = "FAMILY_PHOTOS_MEDIA_DIRS";
pub const ENV_DOWNLOAD_DIR: &str = "FAMILY_PHOTOS_DOWNLOAD_DIR";
pub const ENV_BACKUP_INTERVAL_SECS: &str = "FAMILY_PHOTOS_BACKUP_INTERVAL_SECS";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "FAMILY_PHOTOS_ACCEPT_INVALID_CERTS";

/// Process level configuration. User preferences live in the database instead.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Always ends with `/` so endpoint paths can be appended.
    pub server_url: String,
    pub data_dir: PathBuf,
    /// Roots scanned by the file system media store.
    pub media_dirs: Vec<PathBuf>,
    /// Where photos downloaded from the server are written.
    pub download_dir: PathBuf,
    pub backup_interval: Duration,
    /// The family server commonly runs with a self-signed certificate.
    pub accept_invalid_certs: bool,
}

impl ClientConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = normalize_server_url(
            &lookup(ENV_SERVER_URL).unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
        )?;

        let data_dir = match lookup(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .ok_or_else(|| AppError::Config("Could not find local data directory".into()))?
                .join(APP_DIR_NAME),
        };

        let media_dirs: Vec<PathBuf> = match lookup(ENV_MEDIA_DIRS) {
            Some(dirs) => std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            None => dirs::picture_dir().into_iter().collect(),
        };

        let download_dir = match lookup(ENV_DOWNLOAD_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => media_dirs
                .first()
                .cloned()
                .unwrap_or_else(|| data_dir.clone())
                .join("Family Photos"),
        };

        // Downloads are only indexed when they land below a scanned root.
        if media_dirs.is_empty() {
            log::warn!("Config: no media directories configured, downloads will not be indexed");
        } else if !media_dirs.iter().any(|root| download_dir.starts_with(root)) {
            return Err(AppError::Config(format!(
                "{} ({:?}) must be inside one of the media directories {:?}",
                ENV_DOWNLOAD_DIR, download_dir, media_dirs
            )));
        }

        let backup_interval = match lookup(ENV_BACKUP_INTERVAL_SECS) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    AppError::Config(format!("{} must be a number of seconds, got {:?}", ENV_BACKUP_INTERVAL_SECS, raw))
                })?;
                if secs == 0 {
                    return Err(AppError::Config(format!("{} must be positive", ENV_BACKUP_INTERVAL_SECS)));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_BACKUP_INTERVAL_SECS),
        };

        let accept_invalid_certs = lookup(ENV_ACCEPT_INVALID_CERTS)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            server_url,
            data_dir,
            media_dirs,
            download_dir,
            backup_interval,
            accept_invalid_certs,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}

fn normalize_server_url(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AppError::Config(format!(
            "{} must be an http(s) URL, got {:?}",
            ENV_SERVER_URL, raw
        )));
    }
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| AppError::Config(format!("Invalid server URL {:?}: {}", raw, e)))?;
    let mut url = url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_SERVER_URL, "https://photos.example.org/api"),
            (ENV_DATA_DIR, "/var/lib/fp"),
            (ENV_MEDIA_DIRS, "/media/a:/media/b"),
            (ENV_DOWNLOAD_DIR, "/media/b/Downloads"),
            (ENV_BACKUP_INTERVAL_SECS, "120"),
            (ENV_ACCEPT_INVALID_CERTS, "true"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, "https://photos.example.org/api/");
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/fp/library.db"));
        assert_eq!(
            config.media_dirs,
            vec![PathBuf::from("/media/a"), PathBuf::from("/media/b")]
        );
        assert_eq!(config.download_dir, PathBuf::from("/media/b/Downloads"));
        assert_eq!(config.backup_interval, Duration::from_secs(120));
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_download_dir_defaults_under_first_media_root() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/var/lib/fp"),
            (ENV_MEDIA_DIRS, "/media/a"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.download_dir, PathBuf::from("/media/a/Family Photos"));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_download_dir_outside_media_roots_is_rejected() {
        let result = ClientConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/var/lib/fp"),
            (ENV_MEDIA_DIRS, "/media/a:/media/b"),
            (ENV_DOWNLOAD_DIR, "/srv/downloads"),
        ]));
        assert!(matches!(result, Err(AppError::Config(_))));

        // Component-wise prefix, not a string prefix.
        let result = ClientConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/var/lib/fp"),
            (ENV_MEDIA_DIRS, "/media/a"),
            (ENV_DOWNLOAD_DIR, "/media/ab"),
        ]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/x"), (ENV_SERVER_URL, "ftp://host")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/x"), (ENV_BACKUP_INTERVAL_SECS, "soon")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/x"), (ENV_BACKUP_INTERVAL_SECS, "0")])),
            Err(AppError::Config(_))
        ));
    }
}
