use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slacklib")]
#[command(about = "Read and update synced slacklib bot settings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding database/config.json
    #[arg(short, long, global = true, env = "SLACKLIBBOT_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Keep the backup in memory instead of using SLACKLIBBOT_BACKUP_URL
    #[arg(long, global = true)]
    pub memory_backup: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get the value of a configuration key
    Get(GetArgs),
    /// Update configuration
    Set(SetArgs),
    /// Describe the keys that can be set
    Keys,
}

#[derive(clap::Args)]
pub struct GetArgs {
    /// Key to read; lists the available keys when omitted or unknown
    pub key: Option<String>,
}

#[derive(clap::Args)]
pub struct SetArgs {
    /// Key to update
    pub key: Option<String>,
    /// New value; multiple words are joined with spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub value: Vec<String>,
}
