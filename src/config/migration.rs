use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::EngineOptions;
use crate::Error;
use crate::MigrationOptions;
use crate::Result;
use crate::StorageConfig;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MigrationConfig {
    /// How long to wait for the lock on the legacy database
    #[serde(default = "default_source_open_timeout_ms")]
    pub source_open_timeout_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_open_timeout_ms: default_source_open_timeout_ms(),
        }
    }
}

fn default_source_open_timeout_ms() -> u64 {
    60_000
}

impl MigrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_open_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "source_open_timeout_ms must be greater than 0".to_string(),
            )));
        }
        Ok(())
    }

    /// The destination takes its engine settings from `storage`, except that
    /// it is always opened read-write.
    pub fn to_migration_options(
        &self,
        storage: &StorageConfig,
    ) -> MigrationOptions {
        MigrationOptions {
            source_open_timeout: Duration::from_millis(self.source_open_timeout_ms),
            destination: EngineOptions {
                read_only: false,
                ..storage.to_store_options().engine
            },
        }
    }
}
