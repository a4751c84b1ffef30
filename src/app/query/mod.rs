//! One-shot accessibility and freshness checks
//!
//! Each querier performs a single check without transferring content and
//! reports the outcome by updating its cell. All of them can be awaited
//! directly or spawned onto the runtime with `query_in_background`.

pub mod combined;
pub mod file;
pub mod url;

pub use combined::DownloadableFileQuerier;
pub use file::FileQuerier;
pub use url::UrlQuerier;
