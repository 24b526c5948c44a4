// Tracing initialization with a log level the bot's `debug` key can raise.
use std::sync::OnceLock;

use slacklib_config::{ConfigSnapshot, ConfigValue};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    // Prefer RUST_LOG from env, otherwise start at info.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Apply a new logging level at runtime if the reload handle is configured.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}

/// Switch to debug logging when the bot's `debug` key is on. RUST_LOG wins.
pub fn apply_debug_flag(config: &ConfigSnapshot) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(level) = level_for(config) {
        apply_logging_level(level);
        tracing::debug!("Debug logging enabled from configuration");
    }
}

fn level_for(config: &ConfigSnapshot) -> Option<&'static str> {
    config
        .get("debug")
        .and_then(ConfigValue::as_bool)
        .filter(|debug| *debug)
        .map(|_| "debug")
}
