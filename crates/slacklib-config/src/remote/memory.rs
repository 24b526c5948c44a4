//! In-process backup backend

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ConfigError;
use crate::merger::ConfigMap;
use crate::remote::{RemoteBackup, RemoteRecord};

/// Backup held in memory, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryBackup {
    records: RwLock<HashMap<String, RemoteRecord>>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing record, as if restored from an earlier run
    pub fn with_record(record: RemoteRecord) -> Self {
        let records = HashMap::from([(record.id.clone(), record)]);
        Self {
            records: RwLock::new(records),
        }
    }

    /// Current record for `instance_id`
    pub async fn record(&self, instance_id: &str) -> Option<RemoteRecord> {
        self.records.read().await.get(instance_id).cloned()
    }
}

#[async_trait]
impl RemoteBackup for MemoryBackup {
    fn name(&self) -> &str {
        "memory"
    }

    async fn restore(&self, instance_id: &str) -> Result<Option<RemoteRecord>, ConfigError> {
        Ok(self.record(instance_id).await)
    }

    async fn backup(&self, instance_id: &str, cfg: &ConfigMap) -> Result<(), ConfigError> {
        let record = RemoteRecord::new(instance_id, cfg.clone());
        self.records
            .write()
            .await
            .insert(instance_id.to_string(), record);
        debug!(instance = instance_id, keys = cfg.len(), "Stored in-memory backup");
        Ok(())
    }
}
