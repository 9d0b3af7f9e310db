use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TIME_SERIES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS time_series_signal (
    project_id TEXT NOT NULL,
    sender TEXT NOT NULL,
    serverbeat_tag TEXT NOT NULL,
    serverbeat_subtag TEXT NOT NULL,
    signal_data TEXT NOT NULL,
    signal_timestamp INTEGER NOT NULL,
    PRIMARY KEY (project_id, sender, serverbeat_tag, serverbeat_subtag, signal_timestamp)
);
";

const SINGLE_SIGNAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS single_signal (
    project_id TEXT NOT NULL,
    sender TEXT NOT NULL,
    serverbeat_tag TEXT NOT NULL,
    serverbeat_subtag TEXT NOT NULL,
    signal_timestamp INTEGER NOT NULL,
    actual_status TEXT NOT NULL,
    actual_message TEXT NOT NULL,
    actual_timestamp INTEGER NOT NULL,
    numeric_value REAL,
    PRIMARY KEY (project_id, sender, serverbeat_tag, serverbeat_subtag, signal_timestamp, actual_timestamp)
);
";

const ALERT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert (
    project_id TEXT NOT NULL,
    crumbs TEXT NOT NULL,
    sender TEXT NOT NULL,
    serverbeat_tag TEXT NOT NULL,
    serverbeat_subtag TEXT NOT NULL,
    alert_name TEXT NOT NULL,
    alert_status_code INTEGER NOT NULL,
    alert_message TEXT NOT NULL,
    alert_timestamp INTEGER NOT NULL,
    PRIMARY KEY (project_id, crumbs, sender, serverbeat_tag, serverbeat_subtag, alert_name)
);
CREATE INDEX IF NOT EXISTS idx_alert_project_time ON alert(project_id, alert_timestamp);
";

/// One SQLite database file shared by every store operation.
pub struct Database {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database at `path` and makes sure every table
    /// exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(TIME_SERIES_SCHEMA)?;
        conn.execute_batch(SINGLE_SIGNAL_SCHEMA)?;
        conn.execute_batch(ALERT_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened signal database");
        Ok(Self {
            path: path.to_path_buf(),
            connection: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.lock_connection();
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_dirs_and_tables() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("serverbeat.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());

        let tables: Vec<String> = db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .unwrap();
        assert_eq!(tables, vec!["alert", "single_signal", "time_series_signal"]);
    }

    #[test]
    fn reopen_keeps_existing_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("serverbeat.db");
        {
            let db = Database::open(&path).unwrap();
            db.with_connection(|conn| {
                conn.execute(
                    "INSERT INTO alert VALUES ('p', 'a', 's', 't', 'st', 'n', 0, 'ok', 10)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM alert", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
