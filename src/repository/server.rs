use crate::api::{PhotosApi, UploadRequest};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::exif_cache::ExifCache;
use crate::media_store::MediaStore;
use crate::models::{ExifData, LocalPhoto, NetworkPhoto};
use std::collections::HashSet;
use std::sync::Arc;

/// Server operations that keep the local mirror in step with their results.
pub struct ServerRepository {
    api: Arc<dyn PhotosApi>,
    db: Arc<Database>,
    media_store: Arc<dyn MediaStore>,
    exif_cache: ExifCache,
}

impl ServerRepository {
    pub fn new(
        api: Arc<dyn PhotosApi>,
        db: Arc<Database>,
        media_store: Arc<dyn MediaStore>,
        exif_cache: ExifCache,
    ) -> Self {
        Self {
            api,
            db,
            media_store,
            exif_cache,
        }
    }

    /// Replace the mirror with the server's current listing.
    ///
    /// The listing and the favorites are fetched concurrently and the mirror
    /// is only written when both arrive. An empty listing is treated as
    /// nothing fetched and leaves the mirror alone.
    pub async fn download_all_photos(&self) -> AppResult<bool> {
        let (listing, favorites) = tokio::try_join!(self.api.list_photos(), self.api.favorites())?;

        if listing.is_empty() {
            log::warn!("ServerRepository: server returned no photos, keeping mirror");
            return Ok(false);
        }

        let favorites: HashSet<i64> = favorites.into_iter().collect();
        let photos: Vec<NetworkPhoto> = listing
            .into_iter()
            .map(|basic| {
                let is_favorite = favorites.contains(&basic.id);
                basic.into_network_photo(is_favorite)
            })
            .collect();

        self.db.replace_all_network_photos(&photos)?;
        log::info!("ServerRepository: mirrored {} network photos", photos.len());
        Ok(true)
    }

    /// Upload a device photo and link it to the created network photo.
    ///
    /// Server rejections are logged and reported as `Ok(false)`. Connectivity
    /// and session problems are returned so the caller can retry or log out.
    pub async fn upload_file(
        &self,
        photo: &LocalPhoto,
        make_public: bool,
        folder: Option<&str>,
    ) -> AppResult<bool> {
        let store = self.media_store.clone();
        let to_read = photo.clone();
        let bytes = match tokio::task::spawn_blocking(move || store.read_photo(&to_read)).await? {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("ServerRepository: cannot read {}: {}", photo.uri, e);
                return Ok(false);
            }
        };

        let mime_type = photo
            .mime_type
            .clone()
            .or_else(|| mime_guess::from_path(&photo.name).first().map(|m| m.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let request = UploadRequest {
            name: photo.name.clone(),
            mime_type,
            bytes,
            time_created: photo.time_created,
            folder: folder.map(str::to_string),
            make_public,
        };

        match self.api.upload_photo(request).await {
            Ok(network_photo) => {
                self.db.insert_network_photo(&network_photo)?;
                self.db.set_local_network_photo_id(photo.id, network_photo.id)?;
                log::info!(
                    "ServerRepository: uploaded {} as network photo {}",
                    photo.name,
                    network_photo.id
                );
                Ok(true)
            }
            Err(e) if e.is_transient() => Err(e),
            Err(AppError::NotLoggedIn) => Err(AppError::NotLoggedIn),
            Err(e) => {
                log::error!("ServerRepository: upload of {} rejected: {}", photo.name, e);
                Ok(false)
            }
        }
    }

    /// Download a network photo into the device library, linked to its source.
    pub async fn save_network_photo_to_storage(&self, photo: &NetworkPhoto) -> AppResult<LocalPhoto> {
        if let Some(existing) = self.db.find_local_by_network_id(photo.id)? {
            return Ok(existing);
        }

        let bytes = self.api.download_photo(photo.id).await?;

        let store = self.media_store.clone();
        let name = photo.name.clone();
        let saved = tokio::task::spawn_blocking(move || store.save_photo(&name, None, &bytes)).await??;

        let linked = saved.with_network_photo_id(photo.id);
        if let Err(e) = self.db.insert_or_replace_local_photos(std::slice::from_ref(&linked)) {
            // Without the row the file would be an unlinked duplicate.
            let store = self.media_store.clone();
            let orphan = linked.clone();
            let _ = tokio::task::spawn_blocking(move || store.delete_photo(&orphan)).await;
            return Err(e.into());
        }

        log::info!("ServerRepository: saved network photo {} to {}", photo.id, linked.uri);
        Ok(linked)
    }

    /// Delete on the server, then drop the mirror row and the local link.
    pub async fn delete_network_photo(&self, id: i64) -> AppResult<()> {
        self.api.delete_photo(id).await?;
        self.db.delete_network_photo(id)?;
        self.exif_cache.invalidate(id).await;
        Ok(())
    }

    pub async fn change_photo_location(
        &self,
        photo: &NetworkPhoto,
        make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<NetworkPhoto> {
        let mut updated = self
            .api
            .change_photo_location(photo.id, make_public, target_folder)
            .await?;
        updated.is_favorite = photo.is_favorite;
        self.db.insert_network_photo(&updated)?;
        Ok(updated)
    }

    /// Returns how many photos moved.
    pub async fn rename_network_folder(
        &self,
        source_is_public: bool,
        source_folder: &str,
        target_make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<usize> {
        let mut moved = self
            .api
            .rename_folder(source_is_public, source_folder, target_make_public, target_folder)
            .await?;

        for photo in moved.iter_mut() {
            if let Some(stored) = self.db.get_network_photo(photo.id)? {
                photo.is_favorite = stored.is_favorite;
            }
        }
        self.db.insert_network_photos(&moved)?;
        Ok(moved.len())
    }

    /// The local flag only changes once the server accepted the change.
    pub async fn update_favorite(&self, id: i64, favorite: bool) -> AppResult<()> {
        if favorite {
            self.api.add_favorite(id).await?;
        } else {
            self.api.remove_favorite(id).await?;
        }
        self.db.set_network_favorite(id, favorite)?;
        Ok(())
    }

    pub async fn get_exif_data(&self, id: i64) -> AppResult<ExifData> {
        if let Some(cached) = self.exif_cache.get(id).await {
            return Ok(cached);
        }
        let exif = ExifData::new(self.api.photo_exif(id).await?);
        self.exif_cache.insert(id, exif.clone()).await;
        Ok(exif)
    }

    /// Duplicate groups resolved against the mirror. Ids the mirror does not
    /// know are skipped, and groups left with a single photo are dropped.
    pub async fn get_duplicates(&self) -> AppResult<Vec<Vec<NetworkPhoto>>> {
        let groups = self.api.duplicates().await?;
        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            let mut photos = Vec::with_capacity(group.len());
            for id in group {
                if let Some(photo) = self.db.get_network_photo(id)? {
                    photos.push(photo);
                }
            }
            if photos.len() > 1 {
                resolved.push(photos);
            }
        }
        Ok(resolved)
    }
}
