//! HTTP client layer
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `auth`: request-time credential context
//! - `http`: HEAD/GET with cache-busting, no-cache headers and timeouts
//! - `stream`: response body chunks with a per-chunk read timeout

pub mod auth;
pub mod config;
pub mod http;
pub mod stream;

pub use auth::{CredentialStore, Credentials};
pub use config::ClientConfig;
pub use http::HttpHandler;
pub use stream::ChunkStream;
