use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::history::{MAX_HISTORY_ENTRIES, MAX_SEARCH_RESULTS, SNAPSHOT_BODY_CHARS};
use crate::http::client::DEFAULT_PREVIEW_MAX_BYTES;
use crate::http::request::DEFAULT_TIMEOUT_SECS;
use crate::response_store::{DEFAULT_MAX_ITEMS, DEFAULT_TTL_SECS};
use crate::storage::{JsonFileStorage, MemoryStorage, SqliteStorage, Storage};

pub const DATA_DIR: &str = ".httpstudio";
pub const DATA_DIR_ENV: &str = "HTTPSTUDIO_DATA_DIR";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "httpstudio.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Json,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `config.json` and the stored collections live. Never read from
    /// the file itself.
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub history_limit: usize,
    pub search_limit: usize,
    pub snapshot_body_chars: usize,
    pub preview_max_bytes: usize,
    pub default_timeout_secs: u64,
    pub download_ttl_secs: u64,
    pub download_max_items: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            backend: Backend::default(),
            history_limit: MAX_HISTORY_ENTRIES,
            search_limit: MAX_SEARCH_RESULTS,
            snapshot_body_chars: SNAPSHOT_BODY_CHARS,
            preview_max_bytes: DEFAULT_PREVIEW_MAX_BYTES,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            download_ttl_secs: DEFAULT_TTL_SECS,
            download_max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// `flag` if given, else `env`, else `.httpstudio` under the working directory.
pub fn resolve_data_dir(flag: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Some(dir) = env.filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DATA_DIR)
}

impl Config {
    /// Resolve the data directory from `flag` and the environment, then read
    /// its `config.json`.
    pub fn load(flag: Option<PathBuf>) -> Result<Self> {
        Self::load_from(resolve_data_dir(flag, std::env::var_os(DATA_DIR_ENV)))
    }

    /// Read `<data_dir>/config.json`; a missing file means defaults.
    pub fn load_from(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let file = data_dir.join(CONFIG_FILE);

        let mut config = if file.exists() {
            let raw = fs::read_to_string(&file)
                .map_err(|e| Error::Storage(format!("Failed to read config `{}`: {e}", file.display())))?;
            serde_json::from_str::<Config>(&raw)
                .map_err(|e| Error::Storage(format!("Failed to parse config `{}`: {e}", file.display())))?
        } else {
            Config::default()
        };

        config.data_dir = data_dir;
        tracing::debug!(data_dir = %config.data_dir.display(), backend = ?config.backend, "loaded config");
        Ok(config)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.download_ttl_secs)
    }

    /// Open the configured backend, creating the data directory if needed.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        match self.backend {
            Backend::Memory => Ok(Arc::new(MemoryStorage::new())),
            Backend::Json => Ok(Arc::new(JsonFileStorage::new(&self.data_dir))),
            Backend::Sqlite => {
                fs::create_dir_all(&self.data_dir).map_err(|e| {
                    Error::Storage(format!("Failed to create data directory `{}`: {e}", self.data_dir.display()))
                })?;
                Ok(Arc::new(SqliteStorage::open(&self.data_dir.join(DATABASE_FILE))?))
            }
        }
    }
}
