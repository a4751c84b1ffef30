//! Resource Mirror Library
//!
//! Keeps a local cache of remote resources current: answers "is this resource
//! reachable and is my copy fresh" with a HEAD request, downloads only when
//! needed, and notifies listeners whenever the answer changes.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
