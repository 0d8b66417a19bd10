use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

use super::Storage;

/// Blobs kept in a single `app_state` table, one row per key.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|err| Error::Storage(format!("Failed to open SQLite: {err}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| Error::Storage(format!("Failed to set SQLite journal mode: {err}")))?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|err| Error::Storage(format!("Failed to open SQLite: {err}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS app_state (
             state_key TEXT PRIMARY KEY,
             state_json TEXT NOT NULL,
             updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
           );",
        )
        .map_err(|err| Error::Storage(format!("Failed to initialize SQLite schema: {err}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT state_json FROM app_state WHERE state_key = ?1 LIMIT 1;",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| Error::Storage(format!("Failed to load `{key}` from SQLite: {err}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO app_state (state_key, state_json, updated_at)
               VALUES (?1, ?2, strftime('%s','now'))
               ON CONFLICT(state_key)
               DO UPDATE SET
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at;",
                params![key, value],
            )
            .map_err(|err| Error::Storage(format!("Failed to save `{key}` to SQLite: {err}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_existing_blob() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.get("presets").unwrap(), None);

        storage.set("presets", "[]").unwrap();
        storage.set("presets", "[1]").unwrap();
        assert_eq!(storage.get("presets").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.db");

        SqliteStorage::open(&path).unwrap().set("k", "v").unwrap();
        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }
}
