//! Core application logic for Resource Mirror
//!
//! This module contains the resource state model, the observable cells that
//! hold it, the HTTP client, the URL and file access managers, the queriers,
//! the downloader and the manager facade that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resource_mirror::app::{CredentialStore, DownloadableFileManager, ManagerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManagerConfig::new("https://data.example.org/mirror/", "/tmp/mirror");
//! let credentials = Arc::new(CredentialStore::from_env());
//! let manager = DownloadableFileManager::new(config, credentials).await?;
//!
//! // Check the resource without transferring it
//! let state = manager.query("models/bunny.obj.gz", false).await?;
//! if state.is_download_necessary() {
//!     let state = manager.get_downloaded_file("models/bunny.obj.gz", false).await?;
//!     println!("Cached at {}", state.file_state().path().display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod client;
pub mod download;
pub mod info;
pub mod manager;
pub mod query;
pub mod state;

// Re-export main public API
pub use access::{FileAccessManager, UrlAccessManager};
pub use client::{ClientConfig, CredentialStore, Credentials, HttpHandler};
pub use download::{DownloadPhase, DownloadProgress, Downloader};
pub use info::{DownloadableFileInfo, FileInfo, UrlInfo};
pub use manager::{
    DownloadHandle, DownloadableFileManager, ListenerRef, ListenerTracker, ManagerConfig,
    StateListener,
};
pub use query::{DownloadableFileQuerier, FileQuerier, UrlQuerier};
pub use state::{DownloadableFileState, FileState, FileStatus, UrlState, UrlStatus};
