use super::Database;
use crate::models::{LocalFolder, LocalPhoto};
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::{HashMap, HashSet};

const LOCAL_COLUMNS: &str = "id, network_photo_id, name, time_created, folder, uri, mime_type";

/// What a local refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LocalRefreshSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

fn map_local_row(row: &Row<'_>) -> Result<LocalPhoto> {
    Ok(LocalPhoto {
        id: row.get(0)?,
        network_photo_id: row.get(1)?,
        name: row.get(2)?,
        time_created: row.get(3)?,
        folder: row.get(4)?,
        uri: row.get(5)?,
        mime_type: row.get(6)?,
    })
}

impl Database {
    pub fn get_all_local_photos(&self) -> Result<Vec<LocalPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM local_photo ORDER BY time_created DESC",
            LOCAL_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_local_row)?;
        rows.collect()
    }

    pub fn get_local_photo(&self, id: i64) -> Result<Option<LocalPhoto>> {
        let conn = self.get_conn();
        conn.query_row(
            &format!("SELECT {} FROM local_photo WHERE id = ?1", LOCAL_COLUMNS),
            [id],
            map_local_row,
        )
        .optional()
    }

    /// The local copy of an uploaded photo, if this device has one.
    pub fn find_local_by_network_id(&self, network_photo_id: i64) -> Result<Option<LocalPhoto>> {
        let conn = self.get_conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM local_photo WHERE network_photo_id = ?1 LIMIT 1",
                LOCAL_COLUMNS
            ),
            [network_photo_id],
            map_local_row,
        )
        .optional()
    }

    /// Fails with a constraint error when the id is already present.
    pub fn insert_local_photo(&self, photo: &LocalPhoto) -> Result<()> {
        let conn = self.get_conn();
        conn.execute(
            &format!("INSERT INTO local_photo ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", LOCAL_COLUMNS),
            params![
                photo.id,
                photo.network_photo_id,
                photo.name,
                photo.time_created,
                photo.folder,
                photo.uri,
                photo.mime_type
            ],
        )?;
        Ok(())
    }

    pub fn insert_or_replace_local_photos(&self, photos: &[LocalPhoto]) -> Result<()> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO local_photo ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                LOCAL_COLUMNS
            ))?;
            for photo in photos {
                stmt.execute(params![
                    photo.id,
                    photo.network_photo_id,
                    photo.name,
                    photo.time_created,
                    photo.folder,
                    photo.uri,
                    photo.mime_type
                ])?;
            }
        }
        tx.commit()
    }

    pub fn update_local_photo(&self, photo: &LocalPhoto) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute(
            "UPDATE local_photo
             SET network_photo_id = ?2, name = ?3, time_created = ?4, folder = ?5, uri = ?6, mime_type = ?7
             WHERE id = ?1",
            params![
                photo.id,
                photo.network_photo_id,
                photo.name,
                photo.time_created,
                photo.folder,
                photo.uri,
                photo.mime_type
            ],
        )
    }

    pub fn set_local_network_photo_id(&self, local_id: i64, network_photo_id: i64) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute(
            "UPDATE local_photo SET network_photo_id = ?2 WHERE id = ?1",
            params![local_id, network_photo_id],
        )
    }

    pub fn delete_local_photo(&self, id: i64) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute("DELETE FROM local_photo WHERE id = ?1", [id])
    }

    /// Drop everything and store `photos` as the new table content.
    pub fn replace_all_local_photos(&self, photos: &[LocalPhoto]) -> Result<()> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM local_photo", [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO local_photo ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                LOCAL_COLUMNS
            ))?;
            for photo in photos {
                stmt.execute(params![
                    photo.id,
                    photo.network_photo_id,
                    photo.name,
                    photo.time_created,
                    photo.folder,
                    photo.uri,
                    photo.mime_type
                ])?;
            }
        }
        tx.commit()
    }

    /// Reconcile the table against a fresh media store scan.
    ///
    /// Ids only in the scan are inserted, ids no longer in the scan are
    /// deleted. Ids present on both sides get their metadata refreshed but keep
    /// the stored `network_photo_id`, since the scan knows nothing about
    /// uploads. Runs as one transaction.
    pub fn replace_all_changed_local_photos(
        &self,
        photos: &[LocalPhoto],
    ) -> Result<LocalRefreshSummary> {
        let mut conn = self.get_conn();
        let tx = conn.transaction()?;

        let existing: HashMap<i64, i64> = {
            let mut stmt = tx.prepare("SELECT id, network_photo_id FROM local_photo")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<_>>()?
        };
        let scanned: HashSet<i64> = photos.iter().map(|p| p.id).collect();

        let mut summary = LocalRefreshSummary::default();
        {
            let mut delete = tx.prepare("DELETE FROM local_photo WHERE id = ?1")?;
            for id in existing.keys().filter(|id| !scanned.contains(id)) {
                delete.execute([id])?;
                summary.deleted += 1;
            }

            let mut upsert = tx.prepare(&format!(
                "INSERT OR REPLACE INTO local_photo ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                LOCAL_COLUMNS
            ))?;
            let mut seen = HashSet::with_capacity(photos.len());
            for photo in photos {
                if !seen.insert(photo.id) {
                    continue;
                }
                let network_photo_id = match existing.get(&photo.id) {
                    Some(&stored) => {
                        summary.updated += 1;
                        stored
                    }
                    None => {
                        summary.inserted += 1;
                        photo.network_photo_id
                    }
                };
                upsert.execute(params![
                    photo.id,
                    network_photo_id,
                    photo.name,
                    photo.time_created,
                    photo.folder,
                    photo.uri,
                    photo.mime_type
                ])?;
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    /// One entry per folder, with the most recent photo as the cover.
    pub fn get_local_folders(&self, ascending: bool) -> Result<Vec<LocalFolder>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(
            "SELECT folder, id, uri, MAX(time_created), COUNT(id) FROM local_photo
             WHERE folder IS NOT NULL AND folder <> ''
             GROUP BY folder
             ORDER BY
                 CASE WHEN ?1 <> 0 THEN folder END COLLATE NOCASE ASC,
                 CASE WHEN ?1 = 0 THEN folder END COLLATE NOCASE DESC",
        )?;
        let rows = stmt.query_map([ascending], |row| {
            Ok(LocalFolder {
                name: row.get(0)?,
                cover_photo_id: row.get(1)?,
                cover_photo_uri: row.get(2)?,
                count: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    /// Photos of a folder, newest first. `None` returns all of them.
    pub fn get_local_folder_photos(&self, folder: &str, limit: Option<i64>) -> Result<Vec<LocalPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM local_photo WHERE folder = ?1 ORDER BY time_created DESC LIMIT ?2",
            LOCAL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![folder, limit.unwrap_or(-1)], map_local_row)?;
        rows.collect()
    }

    /// Newest photos of a folder that have no uploaded counterpart yet.
    pub fn get_local_photos_not_backed_up(&self, folder: &str, limit: i64) -> Result<Vec<LocalPhoto>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM local_photo
             WHERE folder = ?1 AND network_photo_id = 0
             ORDER BY time_created DESC LIMIT ?2",
            LOCAL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![folder, limit], map_local_row)?;
        rows.collect()
    }

    /// Unlink every local photo pointing at `network_photo_id`.
    pub fn clear_network_reference(&self, network_photo_id: i64) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute(
            "UPDATE local_photo SET network_photo_id = 0 WHERE network_photo_id = ?1",
            [network_photo_id],
        )
    }

    /// Unlink local photos whose network counterpart is gone from the mirror.
    pub fn repair_dangling_references(&self) -> Result<usize> {
        let conn = self.get_conn();
        let repaired = conn.execute(
            "UPDATE local_photo SET network_photo_id = 0
             WHERE network_photo_id != 0
               AND network_photo_id NOT IN (SELECT id FROM network_photo)",
            [],
        )?;
        if repaired > 0 {
            log::info!("Database: cleared {} dangling network references", repaired);
        }
        Ok(repaired)
    }
}
