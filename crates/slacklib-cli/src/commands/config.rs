use anyhow::Result;
use serde_json::Value;
use slacklib_config::registry::{help_text, readable_keys};
use slacklib_config::{
    ConfigError, ConfigManager, ConfigSnapshot, ConfigValue, Consistency, PresentationDefaults,
    SettableKey,
};

/// Text to post back plus the presentation it is posted with
pub struct Reply {
    pub text: String,
    pub params: PresentationDefaults,
    pub warning: Option<String>,
}

impl Reply {
    fn new(text: String, config: &ConfigSnapshot) -> Self {
        Self {
            text,
            params: config.presentation(),
            warning: None,
        }
    }
}

pub async fn set(manager: &ConfigManager, key: Option<&str>, words: &[String]) -> Result<Reply> {
    let config = manager.get_config().await?;
    let value = words.join(" ");

    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return Ok(Reply::new(
            format!("No key provided.\n{}", help_text()),
            &config,
        ));
    };
    if value.is_empty() {
        return Ok(Reply::new(
            format!("No value provided.\n{}", help_text()),
            &config,
        ));
    }
    if SettableKey::parse(key).is_none() {
        return Ok(Reply::new(
            format!("Invalid configuration key.\n{}", help_text()),
            &config,
        ));
    }

    match manager.set_input(key, &value).await {
        Ok(update) => {
            let warning = match &update.consistency {
                Consistency::Synced => None,
                Consistency::Degraded { reason } => {
                    Some(format!("Saved locally but the remote backup failed: {reason}"))
                }
            };
            Ok(Reply {
                text: format!("Successfully updated *{key}*"),
                params: update.snapshot.presentation(),
                warning,
            })
        }
        Err(e @ ConfigError::Validation(_)) => {
            Ok(Reply::new(format!("{e}\n{}", help_text()), &config))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get(manager: &ConfigManager, key: Option<&str>) -> Result<Reply> {
    let config = manager.get_config().await?;
    let available = readable_keys(&config);

    if let Some(key) = key
        && available.iter().any(|k| k == key)
    {
        let value = config.get(key).map(ConfigValue::to_json).unwrap_or(Value::Null);
        let rendered = serde_json::to_string_pretty(&value)?;
        return Ok(Reply::new(format!("*{key}*:\n```\n{rendered}\n```"), &config));
    }

    Ok(Reply::new(
        format!("Available keys: {}", available.join(",")),
        &config,
    ))
}
