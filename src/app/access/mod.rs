//! Access managers for remote URLs and local files
//!
//! - [`url_manager`] - URL cache, resolution, server-access switch, credentials
//! - [`file_manager`] - sandboxed local-path cache rooted at the cache directory
//! - [`path`] - URL → relative download path derivation

pub mod file_manager;
pub mod path;
pub mod url_manager;

pub use file_manager::FileAccessManager;
pub use path::relative_download_path;
pub use url_manager::UrlAccessManager;
