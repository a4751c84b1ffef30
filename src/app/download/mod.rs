//! Conditional downloads into the local cache
//!
//! - [`core`] - the `Downloader` state machine
//! - [`extract`] - follow-up extraction of `.zip` downloads
//! - [`types`] - phases, progress snapshots and the progress reporter

pub mod core;
pub mod extract;
pub mod types;

pub use self::core::Downloader;
pub use extract::ArchiveExtractor;
pub use types::{DownloadPhase, DownloadProgress, ProgressReporter};

#[cfg(test)]
mod tests;
