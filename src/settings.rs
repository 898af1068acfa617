use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::FolderType;
use std::sync::Arc;

const SHOW_FOLDERS_ASCENDING_KEY: &str = "show_folders_ascending";
const FOLDER_TYPE_KEY: &str = "folder_type";
const AUTO_BACKUP_KEY: &str = "auto_backup";
const EXIF_CACHE_CAPACITY_KEY: &str = "exif_cache_capacity";

pub const DEFAULT_EXIF_CACHE_CAPACITY: u64 = 1024;

/// User preferences stored in the config table.
pub struct Settings {
    db: Arc<Database>,
}

impl Settings {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn get_bool(&self, key: &str, default: bool) -> AppResult<bool> {
        Ok(match self.db.get_config(key)? {
            Some(value) => value == "true",
            None => default,
        })
    }

    pub fn show_folders_ascending(&self) -> AppResult<bool> {
        self.get_bool(SHOW_FOLDERS_ASCENDING_KEY, true)
    }

    pub fn set_show_folders_ascending(&self, ascending: bool) -> AppResult<()> {
        Ok(self
            .db
            .set_config(SHOW_FOLDERS_ASCENDING_KEY, &ascending.to_string())?)
    }

    pub fn folder_type(&self) -> AppResult<FolderType> {
        Ok(self
            .db
            .get_config(FOLDER_TYPE_KEY)?
            .and_then(|v| v.parse::<i32>().ok())
            .map(FolderType::from_index)
            .unwrap_or_default())
    }

    pub fn set_folder_type(&self, folder_type: FolderType) -> AppResult<()> {
        Ok(self
            .db
            .set_config(FOLDER_TYPE_KEY, &folder_type.index().to_string())?)
    }

    pub fn auto_backup(&self) -> AppResult<bool> {
        self.get_bool(AUTO_BACKUP_KEY, false)
    }

    pub fn set_auto_backup(&self, enabled: bool) -> AppResult<()> {
        Ok(self.db.set_config(AUTO_BACKUP_KEY, &enabled.to_string())?)
    }

    pub fn exif_cache_capacity(&self) -> AppResult<u64> {
        Ok(self
            .db
            .get_config(EXIF_CACHE_CAPACITY_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_EXIF_CACHE_CAPACITY))
    }

    pub fn set_exif_cache_capacity(&self, capacity: u64) -> AppResult<()> {
        if capacity == 0 {
            return Err(AppError::InvalidInput("Cache capacity must be positive".into()));
        }
        Ok(self
            .db
            .set_config(EXIF_CACHE_CAPACITY_KEY, &capacity.to_string())?)
    }
}
