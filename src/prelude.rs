//! Prelude module for the Resource Mirror library
//!
//! Re-exports the items most integrations need, so that
//! `use resource_mirror::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use resource_mirror::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ManagerConfig::new("https://data.example.org/", "/tmp/mirror");
//!     let manager = DownloadableFileManager::new(config, Arc::new(CredentialStore::new())).await?;
//!     let state = manager.get_downloaded_file("catalog.json", false).await?;
//!     println!("{:?}", state.file_state().status);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AccessError, AppError, DownloadError, Result};

// Manager facade and the types it hands out
pub use crate::app::{
    ClientConfig, CredentialStore, Credentials, DownloadHandle, DownloadPhase, DownloadProgress,
    DownloadableFileInfo, DownloadableFileManager, DownloadableFileState, FileState, FileStatus,
    ListenerRef, ListenerTracker, ManagerConfig, StateListener, UrlState, UrlStatus,
};

// Configuration file support
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
