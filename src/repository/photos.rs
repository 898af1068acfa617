use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{LocalPhoto, NetworkPhoto};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MEMORIES_MIN_YEARS: i64 = 1;
pub const MEMORIES_MAX_YEARS: i64 = 10;

/// Read access to both photo tables and local reference upkeep.
pub struct PhotosRepository {
    db: Arc<Database>,
}

impl PhotosRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn local_photos(&self) -> AppResult<Vec<LocalPhoto>> {
        Ok(self.db.get_all_local_photos()?)
    }

    pub fn local_photo(&self, id: i64) -> AppResult<Option<LocalPhoto>> {
        Ok(self.db.get_local_photo(id)?)
    }

    pub fn network_photo(&self, id: i64) -> AppResult<Option<NetworkPhoto>> {
        Ok(self.db.get_network_photo(id)?)
    }

    pub fn network_photos(&self, limit: i64, offset: i64) -> AppResult<Vec<NetworkPhoto>> {
        Ok(self.db.get_network_photos(limit, offset)?)
    }

    pub fn favorite_photos(&self) -> AppResult<Vec<NetworkPhoto>> {
        Ok(self.db.get_favorite_photos()?)
    }

    /// The device copy of a network photo, if any.
    pub fn local_copy_of(&self, network_photo_id: i64) -> AppResult<Option<LocalPhoto>> {
        Ok(self.db.find_local_by_network_id(network_photo_id)?)
    }

    pub fn photos_not_backed_up(&self, folder: &str, limit: i64) -> AppResult<Vec<LocalPhoto>> {
        Ok(self.db.get_local_photos_not_backed_up(folder, limit)?)
    }

    /// Network photos keyed by how many whole years ago they were taken.
    pub fn memories(&self, user_id: Option<&str>, now: i64) -> AppResult<BTreeMap<i64, Vec<NetworkPhoto>>> {
        let rows = self.db.get_photos_grouped_by_years_ago(
            user_id,
            MEMORIES_MIN_YEARS,
            MEMORIES_MAX_YEARS,
            now,
        )?;
        let mut grouped: BTreeMap<i64, Vec<NetworkPhoto>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.year_offset).or_default().push(row.photo);
        }
        Ok(grouped)
    }

    /// Forget that `photo` was uploaded.
    pub fn remove_network_reference(&self, photo: &LocalPhoto) -> AppResult<()> {
        if photo.is_saved_to_cloud() {
            self.db.set_local_network_photo_id(photo.id, 0)?;
        }
        Ok(())
    }

    pub fn repair_dangling_references(&self) -> AppResult<usize> {
        Ok(self.db.repair_dangling_references()?)
    }
}
