//! Configuration change events and event bus types

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::TOKEN_KEY;
use crate::merger::ConfigValue;

/// Where a snapshot value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Compiled-in default
    Default,
    /// Local JSON file
    Local,
    /// Restored from the remote backup at startup
    Remote,
    /// Set through `ConfigManager::set_config`
    Runtime,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Operation type for configuration changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOperation {
    /// Startup reconciliation of defaults, local and remote state
    Reconcile,
    /// Single key update
    Set,
}

impl std::fmt::Display for ConfigOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconcile => write!(f, "reconcile"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// Whether the local and remote stores agree after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Consistency {
    /// Both stores hold the same map
    Synced,
    /// The local write committed but the remote backup failed
    Degraded { reason: String },
}

impl Consistency {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Event representing a configuration change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    /// Operation type
    pub operation: ConfigOperation,
    /// Key that changed, `None` for a reconcile
    pub key: Option<String>,
    /// New value, redacted for the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<ConfigValue>,
    /// Remote consistency after the change
    pub consistency: Consistency,
    /// Timestamp of the change
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ConfigChangeEvent {
    /// Startup reconciliation finished
    pub fn reconciled() -> Self {
        Self {
            operation: ConfigOperation::Reconcile,
            key: None,
            new_value: None,
            consistency: Consistency::Synced,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// A single key was set
    pub fn set(key: impl Into<String>, value: &ConfigValue, consistency: Consistency) -> Self {
        let key = key.into();
        let new_value = if key == TOKEN_KEY {
            ConfigValue::from("<secret>")
        } else {
            value.clone()
        };

        Self {
            operation: ConfigOperation::Set,
            key: Some(key),
            new_value: Some(new_value),
            consistency,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
