//! HTTP document-store backup backend
//!
//! Records live at `{base}/tables/{table}/items/{instance}`:
//! - `GET` returns the record, or 404 when none was stored yet
//! - `PUT` overwrites the record with a full `RemoteRecord` body

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::ConfigError;
use crate::merger::ConfigMap;
use crate::remote::{RemoteBackup, RemoteRecord};

/// Connection settings for the document store
#[derive(Debug, Clone)]
pub struct HttpBackupConfig {
    /// Base URL of the document store
    pub base_url: Url,
    /// Table (collection) holding backup records
    pub table: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpBackupConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: Url, table: impl Into<String>) -> Self {
        Self {
            base_url,
            table: table.into(),
            token: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Backup backend speaking JSON over HTTP
pub struct HttpBackup {
    http: reqwest::Client,
    config: HttpBackupConfig,
}

impl HttpBackup {
    pub fn new(config: HttpBackupConfig) -> Result<Self, ConfigError> {
        if config.base_url.cannot_be_a_base() {
            return Err(ConfigError::parse(format!(
                "Backup URL cannot be used as a base: {}",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::parse(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn item_url(&self, instance_id: &str) -> Result<Url, ConfigError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::parse("Backup URL cannot be used as a base"))?
            .pop_if_empty()
            .extend(["tables", self.config.table.as_str(), "items", instance_id]);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        req.header("Accept", "application/json")
    }
}

#[async_trait]
impl RemoteBackup for HttpBackup {
    fn name(&self) -> &str {
        "http"
    }

    async fn restore(&self, instance_id: &str) -> Result<Option<RemoteRecord>, ConfigError> {
        let url = self.item_url(instance_id)?;
        debug!(url = %url, "Restoring config from remote backup");

        let resp = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ConfigError::remote_restore(format!("Failed to reach backup store: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfigError::remote_restore(format!("HTTP {status}: {body}")));
        }

        let record = resp
            .json::<RemoteRecord>()
            .await
            .map_err(|e| ConfigError::remote_restore(format!("Invalid backup record: {e}")))?;
        Ok(Some(record))
    }

    async fn backup(&self, instance_id: &str, cfg: &ConfigMap) -> Result<(), ConfigError> {
        let url = self.item_url(instance_id)?;
        debug!(url = %url, keys = cfg.len(), "Backing up config to remote store");

        let record = RemoteRecord::new(instance_id, cfg.clone());
        let resp = self
            .request(Method::PUT, url)
            .json(&record)
            .send()
            .await
            .map_err(|e| ConfigError::remote_backup(format!("Failed to reach backup store: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfigError::remote_backup(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpBackup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackup")
            .field("base_url", &self.config.base_url.as_str())
            .field("table", &self.config.table)
            .field("has_token", &self.config.token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup(base: &str) -> HttpBackup {
        let config = HttpBackupConfig::new(Url::parse(base).unwrap(), "slacklib-config");
        HttpBackup::new(config).unwrap()
    }

    #[test]
    fn test_item_url() {
        let url = backup("http://localhost:8000").item_url("standup").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/tables/slacklib-config/items/standup"
        );
    }

    #[test]
    fn test_item_url_keeps_base_path_and_encodes() {
        let url = backup("https://store.example.com/api/").item_url("my bot").unwrap();
        assert_eq!(
            url.as_str(),
            "https://store.example.com/api/tables/slacklib-config/items/my%20bot"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let config = HttpBackupConfig::new(Url::parse("mailto:ops@example.com").unwrap(), "t");
        assert!(matches!(HttpBackup::new(config), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = HttpBackupConfig::new(Url::parse("http://localhost").unwrap(), "t")
            .with_token("s3cret");
        let backup = HttpBackup::new(config).unwrap();
        let rendered = format!("{backup:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("has_token: true"));
    }
}
