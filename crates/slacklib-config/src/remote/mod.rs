//! Remote backup of the configuration
//!
//! The whole flattened configuration is stored as one document per instance
//! name. Backends:
//! - HTTP: JSON document store reached with reqwest
//! - Memory: in-process map for local runs and tests

mod http;
mod memory;

pub use http::{HttpBackup, HttpBackupConfig};
pub use memory::MemoryBackup;

use crate::ConfigError;
use crate::merger::ConfigMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stored backup document. Overwritten on every backup, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Instance name the record is stored under
    pub id: String,
    /// Full configuration at backup time
    pub cfg: ConfigMap,
    /// Time of the last backup
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>, cfg: ConfigMap) -> Self {
        Self {
            id: id.into(),
            cfg,
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Trait for remote backup backends
#[async_trait]
pub trait RemoteBackup: Send + Sync {
    /// Name of this backend (for logging and debugging)
    fn name(&self) -> &str;

    /// Fetch the last backup for `instance_id`.
    ///
    /// Returns `Ok(None)` when nothing was ever backed up. Transport and auth
    /// failures are `ConfigError::RemoteRestore`.
    async fn restore(&self, instance_id: &str) -> Result<Option<RemoteRecord>, ConfigError>;

    /// Overwrite the record for `instance_id` with the full map.
    ///
    /// Failures are `ConfigError::RemoteBackup`.
    async fn backup(&self, instance_id: &str, cfg: &ConfigMap) -> Result<(), ConfigError>;
}
