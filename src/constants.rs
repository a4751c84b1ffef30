//! Application constants for Resource Mirror
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for authentication
pub mod env {
    /// Environment variable name for the server username
    pub const USERNAME: &str = "RESOURCE_MIRROR_USERNAME";

    /// Environment variable name for the server password
    pub const PASSWORD: &str = "RESOURCE_MIRROR_PASSWORD";

    /// Overrides `[server] root_url`
    pub const ROOT_URL: &str = "RESOURCE_MIRROR_ROOT_URL";

    /// Overrides `[cache] cache_root`
    pub const CACHE_DIR: &str = "RESOURCE_MIRROR_CACHE_DIR";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("Resource-Mirror/", env!("CARGO_PKG_VERSION"));

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

    /// Maximum wait for response headers or for the next body chunk
    pub const READ_TIMEOUT: Duration = Duration::from_millis(5000);

    /// Query parameter appended to every request to defeat intermediate caches
    pub const CACHE_BUST_PARAM: &str = "nocache";

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix of transparently decompressed resources
    pub const GZIP_SUFFIX: &str = ".gz";

    /// Suffix of resources extracted after download
    pub const ZIP_SUFFIX: &str = ".zip";

    /// Application directory name under the OS cache/config directories
    pub const APP_DIR_NAME: &str = "resource-mirror";

    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "resource-mirror.toml";

    /// Configuration file name inside the user config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Access monitor and background task constants
pub mod monitor {
    use super::Duration;

    /// Default pause between two polling passes
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// Timeout for background task shutdown
    pub const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Progress reporting
pub mod progress {
    /// Highest percentage reported while a phase is still running
    pub const MAX_PHASE_PERCENT: u8 = 99;

    /// Percentage reported once a download is done
    pub const DONE_PERCENT: u8 = 100;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use files::{GZIP_SUFFIX, TEMP_FILE_SUFFIX, ZIP_SUFFIX};
pub use http::USER_AGENT;
pub use monitor::DEFAULT_INTERVAL as DEFAULT_MONITOR_INTERVAL;
