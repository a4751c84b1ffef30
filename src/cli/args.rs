//! Command-line argument parsing for Resource Mirror
//!
//! This module defines the CLI structure using clap derive macros: resource
//! queries, downloads, the access monitor, credential checks and config
//! file management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Resource Mirror - keep a local cache of remote resources current
#[derive(Parser, Debug)]
#[command(
    name = "resource-mirror",
    version,
    about = "Query and mirror remote resources into a local cache",
    long_about = "Checks remote resources for accessibility and freshness, downloads them into a
local cache only when needed, decompresses .gz and unpacks .zip resources, and can keep
watching resources in the background."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging (info level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Server root URL
    #[arg(long, global = true, value_name = "URL")]
    pub root_url: Option<String>,

    /// Never contact the server; answer from the local cache only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check accessibility and freshness without downloading
    Query(QueryArgs),

    /// Download resources whose local copy is missing or out of date
    Download(DownloadArgs),

    /// Watch resources and print every state change until Ctrl-C
    Monitor(MonitorArgs),

    /// Print the local cache path of a resource
    Path(PathArgs),

    /// Verify credentials against the server
    Auth(AuthArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the query command
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Resource URLs, absolute or relative to the root URL
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Query even if the state is already known
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Resource URLs, absolute or relative to the root URL
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Download even if the local copy is current
    #[arg(short, long)]
    pub force: bool,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the monitor command
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Resource URLs to watch
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Seconds between two passes (overrides the config file)
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Arguments for the path command
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Resource URL
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Arguments for the auth command
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Username; prompted for if omitted
    #[arg(short, long)]
    pub username: Option<String>,
}

/// Arguments for config management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default config file
    Init {
        /// Target file (defaults to the per-user config file)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level forced by flags, `None` to use the configured level
    pub fn log_level_override(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl MonitorArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.interval == Some(0) {
            return Err("Monitor interval must be greater than 0".to_string());
        }
        Ok(())
    }
}
