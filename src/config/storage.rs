//! Database location, engine selection and durability settings

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DB_FILE_MODE;
use crate::EngineOptions;
use crate::Error;
use crate::Result;
use crate::StoreOptions;

/// Which on-disk container a store uses
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Legacy container (sled directory)
    Sled,
    /// Current container (single redb file)
    #[default]
    Redb,
}

impl fmt::Display for Backend {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Backend::Sled => write!(f, "sled"),
            Backend::Redb => write!(f, "redb"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageConfig {
    /// Database location: a directory for sled, a single file for redb
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub backend: Backend,

    /// Skip the flush after every write transaction.
    ///
    /// Unsafe: acknowledged writes may be lost on crash until the next sync.
    #[serde(default)]
    pub no_sync: bool,

    /// Open without creating anything and reject all writes
    #[serde(default)]
    pub read_only: bool,

    /// How long to wait for another process to release the database lock.
    /// 0 means fail on the first attempt.
    #[serde(default)]
    pub open_timeout_ms: u64,

    #[serde(default = "default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,

    /// Page cache size hint
    #[serde(default = "default_cache_capacity_bytes")]
    pub cache_capacity_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backend: Backend::default(),
            no_sync: false,
            read_only: false,
            open_timeout_ms: 0,
            lock_retry_interval_ms: default_lock_retry_interval_ms(),
            cache_capacity_bytes: default_cache_capacity_bytes(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/raft-log.db")
}

fn default_lock_retry_interval_ms() -> u64 {
    50
}

fn default_cache_capacity_bytes() -> u64 {
    64 * 1024 * 1024
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "storage db_path cannot be empty".to_string(),
            )));
        }

        if self.lock_retry_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "lock_retry_interval_ms must be greater than 0".to_string(),
            )));
        }

        if self.cache_capacity_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cache_capacity_bytes must be greater than 0".to_string(),
            )));
        }

        Ok(())
    }

    pub fn to_store_options(&self) -> StoreOptions {
        StoreOptions {
            path: self.db_path.clone(),
            engine: EngineOptions {
                no_sync: self.no_sync,
                read_only: self.read_only,
                open_timeout: Duration::from_millis(self.open_timeout_ms),
                lock_retry_interval: Duration::from_millis(self.lock_retry_interval_ms),
                cache_capacity: self.cache_capacity_bytes,
                file_mode: DB_FILE_MODE,
            },
        }
    }
}
