//! Command-line interface components
//!
//! This module contains CLI-specific code for the Resource Mirror binary,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    AuthArgs, Cli, Commands, ConfigAction, ConfigArgs, DownloadArgs, GlobalArgs, MonitorArgs,
    PathArgs, QueryArgs,
};
pub use commands::{
    handle_auth, handle_config, handle_download, handle_monitor, handle_path, handle_query,
};
pub use progress::ProgressDisplay;
