mod cli;
mod commands;
mod observability;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use slacklib_config::{
    ConfigManager, ConfigMap, ConfigValue, HttpBackup, MemoryBackup, RemoteBackup, Settings,
    TOKEN_KEY,
};

use cli::{Cli, Commands};
use output::{print_error, print_reply, print_warning};

#[tokio::main]
async fn main() {
    // Load .env file if present; a missing file is fine
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env().context("Invalid bot settings")?;

    let manager = ConfigManager::builder()
        .with_workdir(&cli.workdir)
        .with_backup(make_backup(&settings, cli.memory_backup)?)
        .with_instance(&settings.instance_name)
        .build()
        .context("Failed to open local config store")?;

    let mut overrides = ConfigMap::new();
    if let Some(token) = &settings.slack_token {
        overrides.insert(TOKEN_KEY.to_string(), ConfigValue::from(token.as_str()));
    }

    // Setup failures leave the bot without a usable configuration
    let config = match manager.setup(overrides).await {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Configuration setup failed: {e}"));
            std::process::exit(2);
        }
    };

    tracing::info!(
        instance = %settings.instance_name,
        workdir = %cli.workdir.display(),
        "Configuration loaded"
    );
    observability::apply_debug_flag(&config);

    match &cli.command {
        Commands::Get(args) => {
            let reply = commands::config::get(&manager, args.key.as_deref()).await?;
            print_reply(&reply.text, &reply.params);
        }
        Commands::Set(args) => {
            let reply = commands::config::set(&manager, args.key.as_deref(), &args.value).await?;
            if let Some(warning) = &reply.warning {
                print_warning(warning);
            }
            print_reply(&reply.text, &reply.params);
        }
        Commands::Keys => {
            output::print_keys();
        }
    }

    Ok(())
}

fn make_backup(settings: &Settings, in_memory: bool) -> Result<Arc<dyn RemoteBackup>> {
    if in_memory {
        return Ok(Arc::new(MemoryBackup::new()));
    }
    let config = settings.http_backup().context("Remote backup is not configured")?;
    Ok(Arc::new(HttpBackup::new(config)?))
}
