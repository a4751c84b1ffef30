//! Manager facade, access monitor and listener delivery
//!
//! - [`core`] - `DownloadableFileManager` and `DownloadHandle`
//! - [`config`] - `ManagerConfig`
//! - [`monitor`] - periodic re-query loop
//! - [`delivery`] - single-consumer listener delivery
//! - [`listener`] - `StateListener` and `ListenerTracker`

pub mod config;
pub mod core;
pub mod delivery;
pub mod listener;
pub mod monitor;

pub use self::core::{DownloadHandle, DownloadableFileManager};
pub use config::ManagerConfig;
pub use listener::{ListenerRef, ListenerTracker, StateListener};
pub use monitor::AccessMonitor;
