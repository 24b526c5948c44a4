//! Environment-provided settings
//!
//! The remote record is addressed by two names taken from the environment:
//! - `SLACKLIBBOT_TABLE_NAME` - table (collection) holding backups
//! - `SLACKLIBBOT_CONFIG_NAME` - instance name of this bot's record
//!
//! The HTTP backend additionally reads `SLACKLIBBOT_BACKUP_URL`,
//! `SLACKLIBBOT_BACKUP_TOKEN` and `SLACKLIBBOT_BACKUP_TIMEOUT_SECS`. The bot
//! token comes from `SLACK_TOKEN`.

use std::time::Duration;

use url::Url;

use crate::ConfigError;
use crate::remote::HttpBackupConfig;

pub const TABLE_NAME_VAR: &str = "SLACKLIBBOT_TABLE_NAME";
pub const CONFIG_NAME_VAR: &str = "SLACKLIBBOT_CONFIG_NAME";
pub const BACKUP_URL_VAR: &str = "SLACKLIBBOT_BACKUP_URL";
pub const BACKUP_TOKEN_VAR: &str = "SLACKLIBBOT_BACKUP_TOKEN";
pub const BACKUP_TIMEOUT_VAR: &str = "SLACKLIBBOT_BACKUP_TIMEOUT_SECS";
pub const SLACK_TOKEN_VAR: &str = "SLACK_TOKEN";

/// Settings needed to reach the remote backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub table_name: String,
    pub instance_name: String,
    pub backup_url: Option<String>,
    pub backup_token: Option<String>,
    pub backup_timeout: Option<Duration>,
    pub slack_token: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).ok_or_else(|| ConfigError::missing_setting(name));

        let backup_timeout = match get(BACKUP_TIMEOUT_VAR) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::parse(format!("{BACKUP_TIMEOUT_VAR} must be whole seconds: {e}"))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            table_name: require(TABLE_NAME_VAR)?,
            instance_name: require(CONFIG_NAME_VAR)?,
            backup_url: get(BACKUP_URL_VAR),
            backup_token: get(BACKUP_TOKEN_VAR),
            backup_timeout,
            slack_token: get(SLACK_TOKEN_VAR),
        })
    }

    /// HTTP backend configuration; requires `SLACKLIBBOT_BACKUP_URL`
    pub fn http_backup(&self) -> Result<HttpBackupConfig, ConfigError> {
        let raw = self
            .backup_url
            .as_deref()
            .ok_or_else(|| ConfigError::missing_setting(BACKUP_URL_VAR))?;
        let url = Url::parse(raw)
            .map_err(|e| ConfigError::parse(format!("Invalid {BACKUP_URL_VAR}: {e}")))?;

        let mut config = HttpBackupConfig::new(url, &self.table_name);
        if let Some(token) = &self.backup_token {
            config = config.with_token(token);
        }
        if let Some(timeout) = self.backup_timeout {
            config = config.with_timeout(timeout);
        }
        Ok(config)
    }
}
