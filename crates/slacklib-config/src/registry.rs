//! User-settable configuration keys
//!
//! Only these keys may be changed from chat commands. Other snapshot keys are
//! readable, except the token which is never listed.

use crate::TOKEN_KEY;
use crate::merger::ConfigSnapshot;

/// Keys a user may change with `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettableKey {
    /// Bot display name
    Name,
    /// Bot emoji
    Emoji,
    /// Standup channel
    Channel,
    /// Operating timezone offset
    Timezone,
    /// Debug mode
    Debug,
}

impl SettableKey {
    /// Returns all settable keys in display order
    pub fn all() -> &'static [SettableKey] {
        &[
            Self::Name,
            Self::Emoji,
            Self::Channel,
            Self::Timezone,
            Self::Debug,
        ]
    }

    /// Parse a key as typed by a user
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "emoji" => Some(Self::Emoji),
            "channel" => Some(Self::Channel),
            "timezone" => Some(Self::Timezone),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Emoji => "emoji",
            Self::Channel => "channel",
            Self::Timezone => "timezone",
            Self::Debug => "debug",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Name => "Bot display name. Default: `SlacklibBot`",
            Self::Emoji => "Bot emoji. Must be a default emoji. Default: `:robot_face:`",
            Self::Channel => "Standup channel. Default: `general`",
            Self::Timezone => "Timezone the bot should operate in. Default: `8`",
            Self::Debug => "Enable debug mode. Default: `false`",
        }
    }
}

impl std::fmt::Display for SettableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys that `get` may show: settable keys first, then every other snapshot
/// key except the token
pub fn readable_keys(snapshot: &ConfigSnapshot) -> Vec<String> {
    let mut keys: Vec<String> = SettableKey::all()
        .iter()
        .map(|key| key.as_str().to_string())
        .collect();

    for key in snapshot.keys() {
        if key != TOKEN_KEY && SettableKey::parse(key).is_none() {
            keys.push(key.to_string());
        }
    }

    keys
}

/// One `*key*: description` line per settable key
pub fn help_text() -> String {
    SettableKey::all()
        .iter()
        .map(|key| format!("*{key}*: {}", key.description()))
        .collect::<Vec<_>>()
        .join("\n")
}
