//! Configuration merging with priority ordering
//!
//! Priority order (lowest to highest):
//! 1. Defaults - Compiled-in values
//! 2. Local - `database/config.json`
//! 3. Remote - Backup restored at startup
//! 4. Runtime - `set_config` writes after startup
//!
//! A key only falls through to a lower layer when every higher layer lacks it,
//! so a local key that the remote record never had survives reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::events::ConfigSource;
use crate::{ConfigError, TOKEN_KEY};

/// Flat configuration mapping as stored locally and remotely
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Priority levels for configuration sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Default = 0,
    Local = 10,
    Remote = 20,
    Runtime = 30,
}

impl From<ConfigSource> for Priority {
    fn from(source: ConfigSource) -> Self {
        match source {
            ConfigSource::Default => Priority::Default,
            ConfigSource::Local => Priority::Local,
            ConfigSource::Remote => Priority::Remote,
            ConfigSource::Runtime => Priority::Runtime,
        }
    }
}

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(Number),
    String(String),
}

impl ConfigValue {
    /// Wrap raw command text. Typed keys are parsed later by [`coerce`].
    pub fn from_input(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Name of the value's type, used in validation messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }

    fn same_kind(&self, other: &ConfigValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl TryFrom<Value> for ConfigValue {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => Ok(Self::Number(n)),
            Value::String(s) => Ok(Self::String(s)),
            other => Err(ConfigError::parse(format!(
                "unsupported configuration value: {other}"
            ))),
        }
    }
}

/// Compiled-in defaults
pub fn defaults() -> ConfigMap {
    ConfigMap::from([
        ("name".to_string(), ConfigValue::from("SlacklibBot")),
        ("emoji".to_string(), ConfigValue::from(":robot_face:")),
        ("channel".to_string(), ConfigValue::from("general")),
        ("timezone".to_string(), ConfigValue::from(8)),
        ("debug".to_string(), ConfigValue::from(false)),
        ("log".to_string(), ConfigValue::from(false)),
    ])
}

/// Presentation parameters attached to every bot reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationDefaults {
    pub icon_emoji: String,
    pub username: String,
    pub as_user: bool,
}

/// Immutable configuration snapshot with per-key provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    values: ConfigMap,
    sources: BTreeMap<String, ConfigSource>,
}

impl ConfigSnapshot {
    /// Snapshot holding only the given defaults
    pub fn from_defaults(defaults: &ConfigMap) -> Self {
        let sources = defaults
            .keys()
            .map(|key| (key.clone(), ConfigSource::Default))
            .collect();

        Self {
            values: defaults.clone(),
            sources,
        }
    }

    /// Layer a map on top of this snapshot.
    ///
    /// A key is replaced only if its current source has equal or lower priority.
    pub fn merge_layer(&mut self, layer: &ConfigMap, source: ConfigSource) {
        let priority = Priority::from(source);

        for (key, value) in layer {
            let should_override = self
                .sources
                .get(key)
                .map(|&existing| Priority::from(existing) <= priority)
                .unwrap_or(true);

            if should_override {
                self.values.insert(key.clone(), value.clone());
                self.sources.insert(key.clone(), source);
            }
        }
    }

    /// Copy of this snapshot with one key replaced by a runtime write
    pub fn with_value(&self, key: &str, value: ConfigValue) -> Self {
        let mut next = self.clone();
        next.values.insert(key.to_string(), value);
        next.sources.insert(key.to_string(), ConfigSource::Runtime);
        next
    }

    /// Snapshot matching the local store after a write.
    ///
    /// Keys whose value is unchanged keep their source; the rest become
    /// runtime values.
    pub fn with_local(&self, local: &ConfigMap) -> Self {
        let sources = local
            .iter()
            .map(|(key, value)| {
                let source = match self.sources.get(key) {
                    Some(&source) if self.values.get(key) == Some(value) => source,
                    _ => ConfigSource::Runtime,
                };
                (key.clone(), source)
            })
            .collect();

        Self {
            values: local.clone(),
            sources,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Source the current value of `key` came from
    pub fn source_of(&self, key: &str) -> Option<ConfigSource> {
        self.sources.get(key).copied()
    }

    pub fn values(&self) -> &ConfigMap {
        &self.values
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether a non-empty token is configured
    pub fn has_token(&self) -> bool {
        match self.get(TOKEN_KEY) {
            Some(ConfigValue::String(token)) => !token.is_empty(),
            _ => false,
        }
    }

    /// Reply parameters derived from `emoji` and `name`
    pub fn presentation(&self) -> PresentationDefaults {
        let text = |key: &str| self.get(key).map(ToString::to_string).unwrap_or_default();

        PresentationDefaults {
            icon_emoji: text("emoji"),
            username: text("name"),
            as_user: false,
        }
    }
}

/// Startup merge: `remote[k]`, else `local[k]`, else `defaults[k]`
pub fn merge(
    defaults: &ConfigMap,
    local: Option<&ConfigMap>,
    remote: Option<&ConfigMap>,
) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::from_defaults(defaults);

    if let Some(local) = local {
        snapshot.merge_layer(local, ConfigSource::Local);
    }
    if let Some(remote) = remote {
        snapshot.merge_layer(remote, ConfigSource::Remote);
    }

    snapshot
}

/// Coerce an incoming value to the type already stored under `key`.
///
/// Text arriving for a typed key is parsed as JSON and must produce the stored
/// type. Any other type change is rejected.
pub fn coerce(
    key: &str,
    existing: Option<&ConfigValue>,
    incoming: ConfigValue,
) -> Result<ConfigValue, ConfigError> {
    let Some(existing) = existing else {
        return Ok(incoming);
    };

    if existing.same_kind(&incoming) {
        return Ok(incoming);
    }

    if let ConfigValue::String(text) = &incoming {
        let parsed = serde_json::from_str::<Value>(text.trim())
            .ok()
            .and_then(|value| ConfigValue::try_from(value).ok())
            .filter(|value| value.same_kind(existing));

        return parsed.ok_or_else(|| {
            ConfigError::validation(format!(
                "Invalid value for *{key}*: expected a {}, got `{text}`",
                existing.kind()
            ))
        });
    }

    Err(ConfigError::validation(format!(
        "Invalid value for *{key}*: expected a {}, got a {}",
        existing.kind(),
        incoming.kind()
    )))
}
