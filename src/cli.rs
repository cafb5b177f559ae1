use crate::types::{ArtifactKind, UpdatePolicy};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "artup")]
#[command(about = "A bootstrap updater for jar artifacts hosted on Maven mirrors")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Which artifact variant to manage
    #[arg(short, long, value_enum, global = true)]
    pub kind: Option<ArtifactKind>,

    /// Update policy: keep, stable or ea
    #[arg(short, long, value_enum, global = true)]
    pub policy: Option<UpdatePolicy>,

    /// Proxy URL (e.g. 'http://127.0.0.1:1080'), or DEFAULT for a direct connection
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Directory holding the installed jar
    #[arg(short, long, global = true)]
    pub dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Update the installed artifact to the newest allowed version (default)
    Update,

    /// Compare the installed version with the newest one without downloading
    Check,

    /// List every version published in the repository, newest first
    Versions,

    /// Print the POM of a published version
    Pom {
        /// Version to fetch (e.g. '0.5.2')
        #[arg(value_name = "VERSION")]
        release: String,
    },

    /// Manage artup's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration setting
    Get {
        /// Key to get (if omitted, shows all settings)
        key: Option<String>,
    },
    /// Set a configuration setting
    Set {
        /// Key and value (e.g., 'policy=ea' or 'policy ea')
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },
    /// Reset a configuration setting to its default
    Unset {
        /// Key to unset (e.g., 'proxy')
        key: String,
    },
    /// Show full configuration
    Show {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
}
