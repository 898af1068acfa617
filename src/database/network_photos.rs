use super::Database;
use crate::models::{FolderType, NetworkFolder, NetworkPhoto, NetworkPhotoWithYearOffset, PUBLIC_USER_ID};
use rusqlite::{params, OptionalExtension, Result, Row, Transaction};

const NETWORK_COLUMNS: &str = "id, user_id, name, time_created, file_size, folder, is_favorite";

const SECONDS_PER_YEAR: i64 = 3600 * 24 * 365;

fn map_network_row(row: &Row<'_>) -> Result<NetworkPhoto> {
    Ok(NetworkPhoto {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        time_created: row.get(3)?,
        file_size: row.get(4)?,
        folder: row.get(5)?,
        is_favorite: row.get(6)?,
    })
}

fn insert_all(tx: &Transaction<'_>, photos: &[NetworkPhoto]) -> Result<()> {
    let mut stmt = tx.prepare(&format!(
        "INSERT OR REPLACE INTO network_photo ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        NETWORK_COLUMNS
    ))?;
    for photo in photos {
        stmt.execute(params![
            photo.id,
            photo.user_id,
            photo.name,
            photo.time_created,
            photo.file_size,
            photo.folder,
            photo.is_favorite
        ])?;
    }
    Ok(())
}

impl Database {
    pub fn get_network_photo(&self, id: i64) -> Result<Option<NetworkPhoto>> {
        let conn = self.get_conn();
        conn.query_row(
            &format!("SELECT {} FROM network_photo WHERE id = ?1", NETWORK_COLUMNS),
            [id],
            map_network_row,
        )
        .optional()
    }

    /// Newest first. A negative `limit` returns everything.
    pub fn get_network_photos(&self, limit: i64, offset: i64) -> Result<Vec<NetworkPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM network_photo ORDER BY time_created DESC LIMIT ?1 OFFSET ?2",
            NETWORK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit, offset], map_network_row)?;
        rows.collect()
    }

    pub fn get_network_folder_photos(&self, folder: &str) -> Result<Vec<NetworkPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM network_photo WHERE folder = ?1 ORDER BY time_created DESC",
            NETWORK_COLUMNS
        ))?;
        let rows = stmt.query_map([folder], map_network_row)?;
        rows.collect()
    }

    pub fn get_favorite_photos(&self) -> Result<Vec<NetworkPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM network_photo WHERE is_favorite = 1 ORDER BY time_created DESC",
            NETWORK_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_network_row)?;
        rows.collect()
    }

    /// One entry per named folder with its newest photo as the cover.
    pub fn get_network_folders(
        &self,
        ascending: bool,
        folder_type: FolderType,
    ) -> Result<Vec<NetworkFolder>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(
            "SELECT folder, id, user_id, MAX(time_created), COUNT(id) FROM network_photo
             WHERE folder IS NOT NULL AND folder <> ''
               AND (?2 = 0
                    OR (?2 = 1 AND user_id <> ?3)
                    OR (?2 = 2 AND user_id = ?3))
             GROUP BY folder
             ORDER BY
                 CASE WHEN ?1 <> 0 THEN folder END COLLATE NOCASE ASC,
                 CASE WHEN ?1 = 0 THEN folder END COLLATE NOCASE DESC",
        )?;
        let rows = stmt.query_map(
            params![ascending, folder_type.index(), PUBLIC_USER_ID],
            |row| {
                Ok(NetworkFolder {
                    name: row.get(0)?,
                    cover_photo_id: row.get(1)?,
                    user_id: row.get(2)?,
                    count: row.get(4)?,
                })
            },
        )?;
        rows.collect()
    }

    /// Photos taken between `min_years` and `max_years` whole years before
    /// `now`, closest years first. `user_id` narrows the owner when set.
    pub fn get_photos_grouped_by_years_ago(
        &self,
        user_id: Option<&str>,
        min_years: i64,
        max_years: i64,
        now: i64,
    ) -> Result<Vec<NetworkPhotoWithYearOffset>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, (?1 - time_created) / ?2 AS year_offset FROM network_photo
             WHERE (?3 IS NULL OR user_id = ?3)
               AND (?1 - time_created) / ?2 BETWEEN ?4 AND ?5
             ORDER BY year_offset ASC, time_created DESC",
            NETWORK_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![now, SECONDS_PER_YEAR, user_id, min_years, max_years],
            |row| {
                Ok(NetworkPhotoWithYearOffset {
                    photo: map_network_row(row)?,
                    year_offset: row.get(7)?,
                })
            },
        )?;
        rows.collect()
    }

    /// Inserts or replaces by id.
    pub fn insert_network_photo(&self, photo: &NetworkPhoto) -> Result<()> {
        self.insert_network_photos(std::slice::from_ref(photo))
    }

    pub fn insert_network_photos(&self, photos: &[NetworkPhoto]) -> Result<()> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;
        insert_all(&tx, photos)?;
        tx.commit()
    }

    pub fn update_network_photo(&self, photo: &NetworkPhoto) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute(
            "UPDATE network_photo
             SET user_id = ?2, name = ?3, time_created = ?4, file_size = ?5, folder = ?6, is_favorite = ?7
             WHERE id = ?1",
            params![
                photo.id,
                photo.user_id,
                photo.name,
                photo.time_created,
                photo.file_size,
                photo.folder,
                photo.is_favorite
            ],
        )
    }

    pub fn set_network_favorite(&self, id: i64, is_favorite: bool) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute(
            "UPDATE network_photo SET is_favorite = ?2 WHERE id = ?1",
            params![id, is_favorite],
        )
    }

    /// Removes the mirror row and unlinks any local photo pointing at it.
    pub fn delete_network_photo(&self, id: i64) -> Result<usize> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE local_photo SET network_photo_id = 0 WHERE network_photo_id = ?1",
            [id],
        )?;
        let deleted = tx.execute("DELETE FROM network_photo WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Swap the whole mirror for `photos` in one transaction.
    pub fn replace_all_network_photos(&self, photos: &[NetworkPhoto]) -> Result<()> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM network_photo", [])?;
        insert_all(&tx, photos)?;
        tx.commit()
    }
}
