//! Command handlers for the Resource Mirror CLI
//!
//! Each handler turns parsed arguments plus the loaded configuration into
//! calls on a `DownloadableFileManager` and prints the outcome.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::client::{CredentialStore, Credentials};
use crate::app::manager::{DownloadableFileManager, ListenerRef, ListenerTracker};
use crate::app::state::DownloadableFileState;
use crate::cli::{
    AuthArgs, ConfigAction, ConfigArgs, DownloadArgs, GlobalArgs, MonitorArgs, PathArgs,
    ProgressDisplay, QueryArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, DownloadError, Result};

/// Handle the query command
pub async fn handle_query(args: QueryArgs, global: &GlobalArgs, config: AppConfig) -> Result<()> {
    let manager = build_manager(global, config, true).await?;

    let mut failures = 0;
    for url in &args.urls {
        match manager.query(url, args.force).await {
            Ok(state) => print_state(&state, global.json)?,
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }

    if failures > 0 {
        return Err(AppError::generic(format!(
            "{} of {} queries failed",
            failures,
            args.urls.len()
        )));
    }
    Ok(())
}

/// Handle the download command
///
/// Downloads run concurrently; Ctrl-C cancels all of them.
pub async fn handle_download(
    args: DownloadArgs,
    global: &GlobalArgs,
    config: AppConfig,
) -> Result<()> {
    let manager = build_manager(global, config, true).await?;
    let display = if args.no_progress || global.quiet || global.json {
        None
    } else {
        Some(ProgressDisplay::new()?)
    };

    let mut handles = Vec::with_capacity(args.urls.len());
    let mut bars = Vec::new();
    for url in &args.urls {
        let handle = manager.download_in_background(url, args.force)?;
        if let Some(display) = &display {
            bars.push(display.follow(url, handle.progress()));
        }
        handles.push((url.clone(), handle));
    }

    let cancels: Vec<_> = handles.iter().map(|(_, h)| h.cancel_token()).collect();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling downloads");
            for cancel in cancels {
                cancel.cancel();
            }
        }
    });

    let mut failures = Vec::new();
    let mut canceled = false;
    let mut states = Vec::new();
    for (url, handle) in handles {
        match handle.wait().await {
            Ok(state) => states.push(state),
            Err(e) if e.is_canceled() => canceled = true,
            Err(e) => failures.push(format!("{}: {}", url, e)),
        }
    }
    interrupt.abort();
    for bar in bars {
        let _ = bar.await;
    }

    for state in &states {
        print_state(state, global.json)?;
    }
    for failure in &failures {
        eprintln!("{}", failure);
    }

    if canceled {
        return Err(DownloadError::Canceled.into());
    }
    if !failures.is_empty() {
        return Err(AppError::generic(format!(
            "{} of {} downloads failed",
            failures.len(),
            args.urls.len()
        )));
    }
    Ok(())
}

/// Handle the monitor command
///
/// Prints every state change of the watched resources until Ctrl-C.
pub async fn handle_monitor(
    args: MonitorArgs,
    global: &GlobalArgs,
    mut config: AppConfig,
) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    if let Some(interval) = args.interval {
        config.monitor.interval_secs = interval;
    }

    let manager = Arc::new(build_manager(global, config, true).await?);
    let tracker = ListenerTracker::new(Arc::clone(&manager));

    let json = global.json;
    let printer: ListenerRef = Arc::new(move |state: &DownloadableFileState| {
        if let Err(e) = print_state(state, json) {
            warn!("Failed to print state: {}", e);
        }
    });
    for url in &args.urls {
        tracker.add(url, Arc::clone(&printer))?;
    }

    manager.start_access_monitor();
    info!(
        "Watching {} resources every {:?}; press Ctrl-C to stop",
        args.urls.len(),
        manager.config().monitor_interval
    );

    tokio::signal::ctrl_c().await?;
    manager.stop_access_monitor().await;
    tracker.remove_all();
    Ok(())
}

/// Handle the path command
pub async fn handle_path(args: PathArgs, global: &GlobalArgs, config: AppConfig) -> Result<()> {
    let manager = build_manager(global, config, false).await?;
    let info = manager.get_info(&args.url)?;
    println!("{}", info.file_info().path().display());
    Ok(())
}

/// Handle the auth command
///
/// Prompts for a password, checks it against the root URL and reports
/// whether the server accepted it. Accepted credentials live only in this
/// process; they are not persisted.
pub async fn handle_auth(args: AuthArgs, global: &GlobalArgs, config: AppConfig) -> Result<()> {
    let manager = build_manager(global, config, false).await?;

    let username = match args.username {
        Some(username) => username,
        None => prompt_username()?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if username.is_empty() || password.is_empty() {
        return Err(AppError::generic("Username and password cannot be empty"));
    }

    if manager
        .update_credentials(Credentials::new(username.clone(), password))
        .await
    {
        println!(
            "{}",
            accepted_message(&username, manager.url_manager().root_url().as_str())
        );
        Ok(())
    } else {
        Err(AppError::generic(format!(
            "Credentials for {} were rejected",
            username
        )))
    }
}

/// Report for accepted credentials, with the env vars that persist them
fn accepted_message(username: &str, root_url: &str) -> String {
    format!(
        "Credentials for {} accepted by {} (not persisted).\n\
         Set {} and {} to use them for downloads.",
        username,
        root_url,
        crate::constants::ENV_USERNAME,
        crate::constants::ENV_PASSWORD
    )
}

/// Handle config management
pub async fn handle_config(args: ConfigArgs, config: AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = match path.or_else(AppConfig::default_config_path) {
                Some(path) => path,
                None => {
                    return Err(AppError::generic(
                        "Could not determine user config directory",
                    ))
                }
            };
            AppConfig::write_default(&path, force).await?;
            println!("Created configuration file: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Apply command-line overrides and build the manager
async fn build_manager(
    global: &GlobalArgs,
    mut config: AppConfig,
    probe: bool,
) -> Result<DownloadableFileManager> {
    if let Some(root_url) = &global.root_url {
        config.server.root_url = root_url.clone();
    }
    if let Some(cache_dir) = &global.cache_dir {
        config.cache.cache_root = Some(cache_dir.clone());
    }
    if !probe || global.offline {
        config.server.probe_on_start = false;
    }

    let manager_config = config.to_manager_config()?;
    debug!("Manager configuration: {:?}", manager_config);

    let manager =
        DownloadableFileManager::new(manager_config, Arc::new(CredentialStore::from_env())).await?;
    if global.offline {
        manager.set_enable_server_access(false);
    }
    Ok(manager)
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn print_state(state: &DownloadableFileState, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string(state)
            .map_err(|e| AppError::generic(format!("Failed to encode state: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    let remote = state.url_state();
    let local = state.file_state();
    println!("{}", remote.url);
    match remote.last_modified {
        Some(modified) => println!("  remote: {} (modified {})", remote.status, modified),
        None => println!("  remote: {}", remote.status),
    }
    println!("  local:  {} {}", local.status, local.path.display());
    println!(
        "  accessible: {}, download necessary: {}",
        yes_no(state.is_accessible()),
        yes_no(state.is_download_necessary())
    );
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
