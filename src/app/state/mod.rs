//! Immutable state snapshots
//!
//! - [`types`] - `UrlStatus`, `FileStatus`, `UrlState`, `FileState`
//! - [`composite`] - `DownloadableFileState` and the download-necessity policy

pub mod composite;
pub mod types;

pub use composite::DownloadableFileState;
pub use types::{FileState, FileStatus, UrlState, UrlStatus};
