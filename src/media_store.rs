//! The device photo library.
//!
//! `FsMediaStore` indexes image and video files below a set of directories.
//! Ids are derived from the file path so that a rescan reports the same id for
//! the same file, which is what lets the local table keep upload links across
//! refreshes.

use crate::errors::{AppError, AppResult};
use crate::metadata;
use crate::models::{ExifField, LocalPhoto};
use reqwest::Url;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait MediaStore: Send + Sync {
    /// Every photo and video currently on the device.
    fn query_media(&self) -> AppResult<Vec<LocalPhoto>>;

    fn read_photo(&self, photo: &LocalPhoto) -> AppResult<Vec<u8>>;

    /// EXIF tags of a device photo; empty when the file carries none.
    fn read_exif(&self, photo: &LocalPhoto) -> AppResult<Vec<ExifField>>;

    /// Store downloaded bytes as a new device photo.
    fn save_photo(&self, name: &str, folder: Option<&str>, bytes: &[u8]) -> AppResult<LocalPhoto>;

    /// Returns false when the file was already gone.
    fn delete_photo(&self, photo: &LocalPhoto) -> AppResult<bool>;
}

pub struct FsMediaStore {
    roots: Vec<PathBuf>,
    download_dir: PathBuf,
}

impl FsMediaStore {
    pub fn new(roots: Vec<PathBuf>, download_dir: PathBuf) -> Self {
        Self { roots, download_dir }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Partial downloads and editor scratch files.
pub fn is_temporary_file(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "tmp" || ext == "part" || ext == "crdownload"
        }
        None => false,
    }
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// `image/*` and `video/*` files only.
pub fn media_mime_type(path: &Path) -> Option<String> {
    let mime = mime_guess::from_path(path).first()?;
    match mime.type_().as_str() {
        "image" | "video" => Some(mime.essence_str().to_string()),
        _ => None,
    }
}

/// Stable positive id for a path.
pub fn photo_id(path: &Path) -> i64 {
    let hash = blake3::hash(path.to_string_lossy().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    let id = (u64::from_le_bytes(bytes) >> 1) as i64;
    if id == 0 {
        1
    } else {
        id
    }
}

fn folder_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(device_name)
}

/// Host name, used for files that sit directly in the file system root.
pub fn device_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "device".to_string())
}

fn file_uri(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(_) => format!("file://{}", path.display()),
    }
}

fn path_from_uri(uri: &str) -> AppResult<PathBuf> {
    Url::parse(uri)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| AppError::InvalidInput(format!("Not a file URI: {}", uri)))
}

fn local_photo_from_path(path: &Path, mime_type: String) -> Option<LocalPhoto> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let meta = metadata::extract_metadata(path);
    Some(LocalPhoto {
        id: photo_id(path),
        network_photo_id: 0,
        name,
        time_created: meta.time_created.unwrap_or(0),
        folder: Some(folder_name(path)),
        uri: file_uri(path),
        mime_type: Some(mime_type),
    })
}

/// A directory that could not be listed hides every photo below it, so the
/// scan result would be incomplete. Symlink loops and broken links only hide
/// themselves.
fn is_unreadable_dir(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return false;
    }
    err.depth() == 0 || err.path().map(|p| p.is_dir()).unwrap_or(false)
}

/// `name`, or `stem (n).ext` for the first free n.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let original = Path::new(name);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = original.extension().map(|e| e.to_string_lossy().to_string());
    let mut n = 1;
    loop {
        let file_name = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

impl MediaStore for FsMediaStore {
    fn query_media(&self) -> AppResult<Vec<LocalPhoto>> {
        if self.roots.is_empty() {
            return Err(AppError::Config("No media directories configured".into()));
        }

        let mut photos = Vec::new();
        let mut seen = HashSet::new();
        for root in &self.roots {
            // An unmounted root must not look like an empty library.
            if !root.is_dir() {
                return Err(AppError::NotFound(format!("Media directory {:?}", root)));
            }

            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if is_unreadable_dir(&e) => {
                        return Err(AppError::Io(format!("Cannot list media directory: {}", e)));
                    }
                    Err(e) => {
                        log::warn!("MediaStore: skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file() || is_hidden(path) || is_temporary_file(path) {
                    continue;
                }
                let Some(mime_type) = media_mime_type(path) else {
                    continue;
                };
                if let Some(photo) = local_photo_from_path(path, mime_type) {
                    if seen.insert(photo.id) {
                        photos.push(photo);
                    }
                }
            }
        }

        log::debug!("MediaStore: found {} media files", photos.len());
        Ok(photos)
    }

    fn read_photo(&self, photo: &LocalPhoto) -> AppResult<Vec<u8>> {
        let path = path_from_uri(&photo.uri)?;
        fs::read(&path).map_err(|e| AppError::Io(format!("Failed to read {:?}: {}", path, e)))
    }

    fn read_exif(&self, photo: &LocalPhoto) -> AppResult<Vec<ExifField>> {
        let path = path_from_uri(&photo.uri)?;
        if !path.is_file() {
            return Err(AppError::NotFound(format!("{:?}", path)));
        }
        Ok(metadata::read_exif_fields(&path))
    }

    fn save_photo(&self, name: &str, folder: Option<&str>, bytes: &[u8]) -> AppResult<LocalPhoto> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty() && !n.starts_with('.'))
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid photo name: {:?}", name)))?;
        let mime_type = media_mime_type(Path::new(&file_name))
            .ok_or_else(|| AppError::InvalidInput(format!("Not a photo or video: {}", file_name)))?;

        let dir = match folder {
            Some(folder) if !folder.trim().is_empty() => {
                self.download_dir.join(folder.trim().replace(['/', '\\'], "_"))
            }
            _ => self.download_dir.clone(),
        };
        fs::create_dir_all(&dir)?;

        let target = unique_path(&dir, &file_name);
        let partial = target.with_file_name(format!(
            "{}.part",
            target.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
        ));

        let written = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            let _ = fs::remove_file(&target);
            return Err(AppError::Io(format!("Failed to save {:?}: {}", target, e)));
        }

        log::info!("MediaStore: saved {:?}", target);
        local_photo_from_path(&target, mime_type)
            .ok_or_else(|| AppError::Io(format!("Saved file has no name: {:?}", target)))
    }

    fn delete_photo(&self, photo: &LocalPhoto) -> AppResult<bool> {
        let path = path_from_uri(&photo.uri)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> FsMediaStore {
        FsMediaStore::new(vec![dir.join("media")], dir.join("media").join("Downloads"))
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_query_keeps_only_media_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        touch(&media.join("Camera/a.jpg"));
        touch(&media.join("Camera/b.mp4"));
        touch(&media.join("Camera/notes.txt"));
        touch(&media.join("Camera/c.jpg.part"));
        touch(&media.join("Camera/.hidden.jpg"));

        let store = store(dir.path());
        let mut photos = store.query_media().unwrap();
        photos.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].name, "a.jpg");
        assert_eq!(photos[0].folder.as_deref(), Some("Camera"));
        assert_eq!(photos[0].mime_type.as_deref(), Some("image/jpeg"));
        assert!(photos[0].uri.starts_with("file://"));
        assert_eq!(photos[1].mime_type.as_deref(), Some("video/mp4"));
        assert!(photos.iter().all(|p| p.id > 0 && p.network_photo_id == 0));
    }

    #[test]
    fn test_ids_are_stable_between_scans() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/Camera/a.jpg"));

        let store = store(dir.path());
        let first = store.query_media().unwrap();
        let second = store.query_media().unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].id, photo_id(&dir.path().join("media/Camera/a.jpg")));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(vec![dir.path().join("unmounted")], dir.path().to_path_buf());
        assert!(store.query_media().is_err());

        let empty = FsMediaStore::new(Vec::new(), dir.path().to_path_buf());
        assert!(matches!(empty.query_media(), Err(AppError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_fails_the_scan() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        touch(&media.join("Camera/a.jpg"));
        touch(&media.join("Locked/b.jpg"));
        let locked = media.join("Locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not apply to root.
        let enforced = fs::read_dir(&locked).is_err();
        let result = store(dir.path()).query_media();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if enforced {
            assert!(matches!(result, Err(AppError::Io(_))));
        } else {
            assert_eq!(result.unwrap().len(), 2);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        touch(&media.join("Camera/a.jpg"));
        std::os::unix::fs::symlink(dir.path().join("gone.jpg"), media.join("Camera/link.jpg")).unwrap();

        let photos = store(dir.path()).query_media().unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].name, "a.jpg");
    }

    #[test]
    fn test_save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("media")).unwrap();
        let store = store(dir.path());

        let first = store.save_photo("beach.jpg", None, b"one").unwrap();
        let second = store.save_photo("beach.jpg", None, b"two").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.name, "beach (1).jpg");
        assert_eq!(first.folder.as_deref(), Some("Downloads"));
        assert_eq!(store.read_photo(&second).unwrap(), b"two");

        assert!(store.delete_photo(&first).unwrap());
        assert!(!store.delete_photo(&first).unwrap());
        assert_eq!(store.query_media().unwrap().len(), 1);
    }

    #[test]
    fn test_read_exif_of_device_photo() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("media/Camera/a.jpg"));
        let store = store(dir.path());
        let photo = store.query_media().unwrap().remove(0);

        assert!(store.read_exif(&photo).unwrap().is_empty());

        fs::remove_file(dir.path().join("media/Camera/a.jpg")).unwrap();
        assert!(matches!(store.read_exif(&photo), Err(AppError::NotFound(_))));

        let remote = LocalPhoto {
            uri: "https://example.org/a.jpg".to_string(),
            ..photo
        };
        assert!(matches!(store.read_exif(&remote), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_save_rejects_non_media_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.save_photo("notes.txt", None, b"x"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            store.save_photo("", None, b"x"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_save_into_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let photo = store.save_photo("../x.png", Some("Trip/2020"), b"x").unwrap();
        assert_eq!(photo.name, "x.png");
        assert_eq!(photo.folder.as_deref(), Some("Trip_2020"));
    }
}
