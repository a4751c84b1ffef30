//! Observable per-resource state cells
//!
//! - [`cell`] - generic `StateCell` with notify-on-change observers
//! - [`url_info`] - one cell per remote URL
//! - [`file_info`] - one cell per local path
//! - [`downloadable`] - composite cell recomputed from a URL cell and a file cell

pub mod cell;
pub mod downloadable;
pub mod file_info;
pub mod url_info;

pub use cell::{ObserverId, StateCell};
pub use downloadable::DownloadableFileInfo;
pub use file_info::FileInfo;
pub use url_info::UrlInfo;
