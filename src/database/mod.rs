mod backup_folders;
mod local_photos;
mod network_photos;

pub use local_photos::LocalRefreshSummary;

use rusqlite::{Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Lock the connection. A panic while the lock was held leaves any open
    /// transaction rolled back by its drop, so a poisoned lock is reused.
    pub fn get_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            log::warn!("Database: connection lock was poisoned, reusing it");
            poisoned.into_inner()
        })
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.get_conn();
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        log::info!("Database schema version: {}", version);

        if version < 1 {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS local_photo (
                     id INTEGER PRIMARY KEY NOT NULL,
                     network_photo_id INTEGER NOT NULL DEFAULT 0, -- 0 when not uploaded
                     name TEXT NOT NULL,
                     time_created INTEGER NOT NULL,               -- Unix timestamp
                     folder TEXT,
                     uri TEXT NOT NULL,
                     mime_type TEXT
                 );

                 CREATE TABLE IF NOT EXISTS network_photo (
                     id INTEGER PRIMARY KEY NOT NULL,
                     user_id TEXT NOT NULL,
                     name TEXT NOT NULL,
                     time_created INTEGER NOT NULL,
                     folder TEXT
                 );
                 PRAGMA user_version = 1;
                 COMMIT;",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "BEGIN;
                 ALTER TABLE network_photo ADD COLUMN file_size INTEGER NOT NULL DEFAULT 0;
                 PRAGMA user_version = 2;
                 COMMIT;",
            )?;
        }

        if version < 3 {
            conn.execute_batch(
                "BEGIN;
                 CREATE INDEX IF NOT EXISTS idx_network_photo_time
                     ON network_photo(time_created DESC);
                 PRAGMA user_version = 3;
                 COMMIT;",
            )?;
        }

        if version < 4 {
            conn.execute_batch(
                "BEGIN;
                 ALTER TABLE network_photo ADD COLUMN is_favorite INTEGER NOT NULL DEFAULT 0;
                 PRAGMA user_version = 4;
                 COMMIT;",
            )?;
        }

        if version < 5 {
            // Folders picked for automatic backup
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS backup_local_folders (
                     name TEXT PRIMARY KEY NOT NULL
                 );
                 PRAGMA user_version = 5;
                 COMMIT;",
            )?;
        }

        if version < 6 {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS config (
                     key TEXT PRIMARY KEY NOT NULL,
                     value TEXT NOT NULL,
                     updated_at INTEGER NOT NULL
                 );
                 PRAGMA user_version = 6;
                 COMMIT;",
            )?;
        }

        if version < 7 {
            conn.execute_batch(
                "BEGIN;
                 CREATE INDEX IF NOT EXISTS idx_local_photo_network
                     ON local_photo(network_photo_id);
                 PRAGMA user_version = 7;
                 COMMIT;",
            )?;
        }

        Ok(())
    }

    // --- Config ---

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_conn();
        conn.query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
    }

    /// Set a config value
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.get_conn();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)",
            (key, value, now),
        )?;
        Ok(())
    }

    pub fn remove_config(&self, key: &str) -> Result<()> {
        let conn = self.get_conn();
        conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }
}
