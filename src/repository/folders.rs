use crate::database::{Database, LocalRefreshSummary};
use crate::errors::{AppError, AppResult};
use crate::media_store::MediaStore;
use crate::models::{ExifData, FolderType, LocalFolder, LocalPhoto, NetworkFolder, NetworkPhoto};
use std::sync::Arc;

pub struct FoldersRepository {
    db: Arc<Database>,
    media_store: Arc<dyn MediaStore>,
}

impl FoldersRepository {
    pub fn new(db: Arc<Database>, media_store: Arc<dyn MediaStore>) -> Self {
        Self { db, media_store }
    }

    /// Rescan the device library and reconcile the local table with it.
    ///
    /// Failures are logged and swallowed: a scan that cannot run, or that
    /// finds nothing, leaves the table exactly as it was. Returns what changed
    /// when the refresh ran.
    pub async fn update_phone_albums(&self) -> Option<LocalRefreshSummary> {
        let store = self.media_store.clone();
        let db = self.db.clone();

        let result = tokio::task::spawn_blocking(move || -> AppResult<Option<LocalRefreshSummary>> {
            let photos = store.query_media()?;
            if photos.is_empty() {
                return Ok(None);
            }
            Ok(Some(db.replace_all_changed_local_photos(&photos)?))
        })
        .await;

        match result {
            Ok(Ok(None)) => {
                log::warn!("FoldersRepository: device query returned no photos, keeping the local table");
                None
            }
            Ok(Ok(Some(summary))) => {
                log::info!(
                    "FoldersRepository: local refresh done ({} new, {} kept, {} removed)",
                    summary.inserted,
                    summary.updated,
                    summary.deleted
                );
                Some(summary)
            }
            Ok(Err(e)) => {
                log::error!("FoldersRepository: local refresh skipped: {}", e);
                None
            }
            Err(e) => {
                log::error!("FoldersRepository: local refresh task failed: {}", e);
                None
            }
        }
    }

    pub fn local_folders(&self, ascending: bool) -> AppResult<Vec<LocalFolder>> {
        Ok(self.db.get_local_folders(ascending)?)
    }

    pub fn network_folders(
        &self,
        ascending: bool,
        folder_type: FolderType,
    ) -> AppResult<Vec<NetworkFolder>> {
        Ok(self.db.get_network_folders(ascending, folder_type)?)
    }

    pub fn local_photos_from_folder(&self, folder: &str) -> AppResult<Vec<LocalPhoto>> {
        Ok(self.db.get_local_folder_photos(folder, None)?)
    }

    pub fn network_photos_from_folder(&self, folder: &str) -> AppResult<Vec<NetworkPhoto>> {
        Ok(self.db.get_network_folder_photos(folder)?)
    }

    /// EXIF of a device photo, read from the file itself.
    pub async fn local_exif_data(&self, id: i64) -> AppResult<ExifData> {
        let photo = self
            .db
            .get_local_photo(id)?
            .ok_or_else(|| AppError::NotFound(format!("Local photo {}", id)))?;
        let store = self.media_store.clone();
        let fields = tokio::task::spawn_blocking(move || store.read_exif(&photo)).await??;
        Ok(ExifData::new(fields))
    }

    pub fn backup_folders(&self) -> AppResult<Vec<String>> {
        Ok(self.db.get_backup_folders()?)
    }

    pub fn set_backup_folder(&self, folder: &str, enabled: bool) -> AppResult<()> {
        if enabled {
            self.db.add_backup_folder(folder)?;
        } else {
            self.db.remove_backup_folder(folder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExifField;
    use crate::test_support::{local_photo, FakeMediaStore};

    fn setup(photos: Vec<LocalPhoto>) -> (Arc<Database>, Arc<FakeMediaStore>, FoldersRepository) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(FakeMediaStore::with_photos(photos));
        let repo = FoldersRepository::new(db.clone(), store.clone());
        (db, store, repo)
    }

    fn stored_ids(db: &Database) -> Vec<i64> {
        let mut ids: Vec<i64> = db.get_all_local_photos().unwrap().iter().map(|p| p.id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_refresh_keeps_links_and_matches_scan() {
        let (db, store, repo) = setup(vec![
            local_photo(1, "Camera", 10),
            local_photo(2, "Camera", 20),
            local_photo(3, "Camera", 30),
        ]);
        repo.update_phone_albums().await.unwrap();
        db.set_local_network_photo_id(2, 50).unwrap();

        store.set_photos(vec![
            local_photo(2, "Camera", 20),
            local_photo(3, "Camera", 30),
            local_photo(4, "Camera", 40),
        ]);
        let summary = repo.update_phone_albums().await.unwrap();

        assert_eq!(stored_ids(&db), vec![2, 3, 4]);
        assert_eq!(db.get_local_photo(2).unwrap().unwrap().network_photo_id, 50);
        assert_eq!(db.get_local_photo(4).unwrap().unwrap().network_photo_id, 0);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.inserted, 1);
    }

    #[tokio::test]
    async fn test_failed_query_leaves_table_untouched() {
        let (db, store, repo) = setup(vec![local_photo(1, "Camera", 10), local_photo(2, "Camera", 20)]);
        repo.update_phone_albums().await.unwrap();

        store.set_fail_query(true);
        assert!(repo.update_phone_albums().await.is_none());
        assert_eq!(stored_ids(&db), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_scan_keeps_links() {
        let (db, store, repo) = setup(vec![local_photo(1, "Camera", 10)]);
        repo.update_phone_albums().await.unwrap();
        db.set_local_network_photo_id(1, 50).unwrap();

        store.set_photos(Vec::new());
        assert!(repo.update_phone_albums().await.is_none());

        store.set_photos(vec![local_photo(1, "Camera", 10)]);
        repo.update_phone_albums().await.unwrap();
        assert_eq!(db.get_local_photo(1).unwrap().unwrap().network_photo_id, 50);
    }

    #[tokio::test]
    async fn test_local_exif_data() {
        let (_db, store, repo) = setup(vec![local_photo(1, "Camera", 10)]);
        repo.update_phone_albums().await.unwrap();
        store.set_exif(
            1,
            vec![ExifField {
                tag: "Model".to_string(),
                value: "Pixel 7".to_string(),
            }],
        );

        let exif = repo.local_exif_data(1).await.unwrap();
        assert_eq!(exif.get("Model"), Some("Pixel 7"));
        assert!(matches!(repo.local_exif_data(2).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_folder_listing_and_backup_selection() {
        let (_db, _store, repo) = setup(vec![
            local_photo(1, "Camera", 10),
            local_photo(2, "Screenshots", 20),
        ]);
        repo.update_phone_albums().await.unwrap();

        let folders = repo.local_folders(true).unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(repo.local_photos_from_folder("Camera").unwrap()[0].id, 1);

        repo.set_backup_folder("Camera", true).unwrap();
        assert_eq!(repo.backup_folders().unwrap(), vec!["Camera"]);
        repo.set_backup_folder("Camera", false).unwrap();
        assert!(repo.backup_folders().unwrap().is_empty());
    }
}
