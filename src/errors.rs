//! Error types for Resource Mirror
//!
//! This module defines the error taxonomy shared by the access managers,
//! queriers, downloader and manager facade. Errors are designed to keep the
//! distinctions callers act on: an authorization failure is never folded into
//! "not found", and a user-initiated cancel is never reported as a failure.

use std::path::PathBuf;

use thiserror::Error;

/// Remote and local access errors
#[derive(Error, Debug)]
pub enum AccessError {
    /// URL string could not be turned into a usable URL
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Server rejected the request with 401 or 403
    #[error("Not authorized to access {url}")]
    NotAuthorized { url: String },

    /// Resource does not exist on the server
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// Any other non-2xx response
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Timeout, unreachable host, DNS failure
    #[error("Connection to {url} failed")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No response arrived within the timeout
    #[error("Request to {url} timed out after {millis} ms")]
    Timeout { url: String, millis: u64 },

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed")]
    ClientSetup(#[source] reqwest::Error),

    /// Server access is globally disabled (offline mode)
    #[error("Server access is disabled")]
    ServerAccessDisabled,

    /// A path resolved outside of the cache root
    #[error("Path escapes the cache root: {path}")]
    PathEscapesRoot { path: PathBuf },

    /// Local file system failure while stat-ing or creating directories
    #[error("File system error")]
    Io(#[from] std::io::Error),
}

/// Download and persistence errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The freshness check or the transfer hit an access failure
    #[error(transparent)]
    Access(#[from] AccessError),

    /// HTTP transfer error after the response started
    #[error("HTTP transfer failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during write, rename or extraction
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// The download was canceled by the caller
    #[error("Download canceled")]
    Canceled,

    /// No data arrived within the read timeout
    #[error("Read timed out after {millis} ms")]
    ReadTimeout { millis: u64 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Incomplete download
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Archive extraction failed
    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    /// Background task panicked or was aborted
    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

impl DownloadError {
    /// True when the error is a user-initiated cancel rather than a failure
    pub fn is_canceled(&self) -> bool {
        matches!(self, DownloadError::Canceled)
    }

    /// True when the server refused the credentials in use
    pub fn is_not_authorized(&self) -> bool {
        matches!(
            self,
            DownloadError::Access(AccessError::NotAuthorized { .. })
        )
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Could not serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Config file could not be read or written
    #[error("Configuration file I/O error")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Access error
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Access(AccessError::Connection { .. })
            | AppError::Access(AccessError::Timeout { .. })
            | AppError::Download(DownloadError::Access(AccessError::Connection { .. }))
            | AppError::Download(DownloadError::Http(_))
            | AppError::Download(DownloadError::ReadTimeout { .. })
            | AppError::Download(DownloadError::IncompleteDownload { .. }) => true,

            AppError::Access(AccessError::InvalidUrl { .. })
            | AppError::Access(AccessError::NotAuthorized { .. })
            | AppError::Download(DownloadError::Canceled)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Access(_) => "access",
            AppError::Download(DownloadError::Canceled) => "canceled",
            AppError::Download(_) => "download",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Access result type alias
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_is_distinct_from_failure() {
        let canceled = DownloadError::Canceled;
        assert!(canceled.is_canceled());
        assert!(!canceled.is_not_authorized());

        let app: AppError = canceled.into();
        assert_eq!(app.category(), "canceled");
        assert!(!app.is_recoverable());
    }

    #[test]
    fn test_not_authorized_is_distinct() {
        let err = DownloadError::Access(AccessError::NotAuthorized {
            url: "http://host/a".to_string(),
        });
        assert!(err.is_not_authorized());

        let not_found = DownloadError::Access(AccessError::NotFound {
            url: "http://host/a".to_string(),
        });
        assert!(!not_found.is_not_authorized());
    }

    #[test]
    fn test_error_categories() {
        let err = AppError::Access(AccessError::ServerAccessDisabled);
        assert_eq!(err.category(), "access");
        assert_eq!(AppError::generic("boom").category(), "generic");
        assert_eq!(
            AppError::generic("boom").to_string(),
            "Application error: boom"
        );
    }
}
