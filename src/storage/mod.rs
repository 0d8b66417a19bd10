//! # Persistence
//!
//! Presets, history, favorites and the draft request are each stored as one
//! JSON blob under a fixed key. Backends only need to get and replace whole
//! blobs; every write replaces the entire collection.

pub mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

pub use sqlite::SqliteStorage;

pub const PRESETS_KEY: &str = "httpstudio_presets_v2";
pub const HISTORY_KEY: &str = "httpstudio_history_v1";
pub const FAVORITES_KEY: &str = "httpstudio_star_v1";
pub const DRAFT_KEY: &str = "httpstudio_draft_v1";

/// Key/value blob storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Read and decode the blob under `key`. A missing blob yields the default;
/// so does a blob that no longer decodes.
pub fn load_json<T>(storage: &dyn Storage, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = storage.get(key)? else {
        return Ok(T::default());
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(key, "discarding unreadable stored collection: {err}");
            Ok(T::default())
        }
    }
}

pub fn save_json<T>(storage: &dyn Storage, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

/// Process-local storage, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per collection inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Storage(format!("Failed to create data directory `{}`: {e}", self.dir.display()))
        })
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file(key);
        if !file.exists() {
            return Ok(None);
        }

        fs::read_to_string(&file)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Failed to read `{}`: {e}", file.display())))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir()?;
        let file = self.file(key);
        let staging = file.with_extension("json.tmp");

        fs::write(&staging, value)
            .map_err(|e| Error::Storage(format!("Failed to write `{}`: {e}", staging.display())))?;
        fs::rename(&staging, &file)
            .map_err(|e| Error::Storage(format!("Failed to replace `{}`: {e}", file.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "[1,2]").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn load_json_defaults_when_missing_or_corrupt() {
        let storage = MemoryStorage::new();
        let empty: Vec<String> = load_json(&storage, "list").unwrap();
        assert!(empty.is_empty());

        storage.set("list", "{ definitely not a list").unwrap();
        let corrupt: Vec<String> = load_json(&storage, "list").unwrap();
        assert!(corrupt.is_empty());

        save_json(&storage, "list", &vec!["a".to_string()]).unwrap();
        let loaded: Vec<String> = load_json(&storage, "list").unwrap();
        assert_eq!(loaded, vec!["a".to_string()]);
    }

    #[test]
    fn json_files_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested"));
        storage.set(HISTORY_KEY, "[]").unwrap();
        storage.set(HISTORY_KEY, "[{}]").unwrap();

        let reopened = JsonFileStorage::new(dir.path().join("nested"));
        assert_eq!(reopened.get(HISTORY_KEY).unwrap().as_deref(), Some("[{}]"));
        assert!(!reopened.dir().join("httpstudio_history_v1.json.tmp").exists());
    }
}
