use super::Database;
use rusqlite::Result;

impl Database {
    pub fn get_backup_folders(&self) -> Result<Vec<String>> {
        let conn = self.get_conn();
        let mut stmt = conn.prepare("SELECT name FROM backup_local_folders ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    pub fn add_backup_folder(&self, name: &str) -> Result<()> {
        let conn = self.get_conn();
        conn.execute(
            "INSERT OR IGNORE INTO backup_local_folders (name) VALUES (?1)",
            [name],
        )?;
        Ok(())
    }

    pub fn remove_backup_folder(&self, name: &str) -> Result<usize> {
        let conn = self.get_conn();
        conn.execute("DELETE FROM backup_local_folders WHERE name = ?1", [name])
    }
}
