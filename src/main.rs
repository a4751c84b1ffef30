//! Resource Mirror CLI application
//!
//! Command-line interface for querying remote resources and mirroring them
//! into a local cache.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library (module is public but not re-exported)
use resource_mirror::cli::{
    handle_auth, handle_config, handle_download, handle_monitor, handle_path, handle_query, Cli,
    Commands,
};
use resource_mirror::config::AppConfig;
use resource_mirror::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("Resource Mirror v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Query(args) => {
            debug!("Executing query command");
            handle_query(args, &cli.global, config).await
        }
        Commands::Download(args) => {
            debug!("Executing download command");
            handle_download(args, &cli.global, config).await
        }
        Commands::Monitor(args) => {
            debug!("Executing monitor command");
            handle_monitor(args, &cli.global, config).await
        }
        Commands::Path(args) => handle_path(args, &cli.global, config).await,
        Commands::Auth(args) => {
            debug!("Executing auth command");
            handle_auth(args, &cli.global, config).await
        }
        Commands::Config(args) => handle_config(args, config).await,
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = cli
        .log_level_override()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| config.logging.level.clone());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("resource_mirror={}", level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();
}
