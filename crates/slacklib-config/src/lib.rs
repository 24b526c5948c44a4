//! Configuration synchronization for slacklib bots
//!
//! This crate keeps a bot's flat key/value configuration consistent between:
//! - Compiled-in defaults
//! - A local JSON file (`database/config.json`)
//! - A remote backup document addressed by an instance name
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ConfigManager                       │
//! │   setup ──► restore ──► merge ──► local ──► backup       │
//! │   set   ──► coerce  ──► local ──► backup ──► snapshot    │
//! │                                                          │
//! │  ┌────────────┐   ┌──────────────┐   ┌────────────────┐  │
//! │  │ LocalStore │   │ RemoteBackup │   │     merger     │  │
//! │  └────────────┘   └──────────────┘   └────────────────┘  │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │ Arc<ConfigSnapshot>
//!                 ┌───────────┴───────────┐
//!                 ▼                       ▼
//!          command handlers         event subscribers
//! ```
//!
//! Precedence at startup is `remote > local > defaults`; after startup every
//! `set_config` commits locally first and then re-backs up the whole map.

pub mod events;
pub mod manager;
pub mod merger;
pub mod registry;
pub mod remote;
pub mod settings;
pub mod storage;

// Re-export main types
pub use events::{ConfigChangeEvent, ConfigOperation, ConfigSource, Consistency};
pub use manager::{ConfigManager, ConfigManagerBuilder, ConfigUpdate, Lifecycle};
pub use merger::{ConfigMap, ConfigSnapshot, ConfigValue, PresentationDefaults};
pub use registry::SettableKey;
pub use remote::{HttpBackup, MemoryBackup, RemoteBackup, RemoteRecord};
pub use settings::Settings;
pub use storage::LocalStore;

/// Key that must be present and non-empty once startup reconciliation is done.
pub const TOKEN_KEY: &str = "token";

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Setup has already been called")]
    AlreadyInitialized,

    #[error("ConfigError: Token is not configured")]
    MissingToken,

    #[error("Configuration not setup")]
    NotInitialized,

    #[error("Remote backup error: {0}")]
    RemoteBackup(String),

    #[error("Remote restore error: {0}")]
    RemoteRestore(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn remote_backup(msg: impl Into<String>) -> Self {
        Self::RemoteBackup(msg.into())
    }

    pub fn remote_restore(msg: impl Into<String>) -> Self {
        Self::RemoteRestore(msg.into())
    }

    pub fn missing_setting(name: impl Into<String>) -> Self {
        Self::MissingSetting(name.into())
    }

    /// Errors that abort startup: a repeated `setup` or a missing token.
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::AlreadyInitialized | Self::MissingToken)
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
