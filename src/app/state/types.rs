//! Remote and local state snapshots
//!
//! `UrlState` and `FileState` are immutable, value-equal snapshots. A new
//! snapshot is produced for every observation; cells compare snapshots to
//! decide whether observers need to hear about a change.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Accessibility of a remote URL as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrlStatus {
    /// No reliable information (never queried, or offline)
    Unknown,
    /// 2xx response
    Accessible,
    /// 401 or 403 response
    NotAuthorized,
    /// 404/410 response, or a missing `file:` target
    NotFound,
    /// Any other non-2xx response
    HttpError,
    /// Timeout, refused connection, DNS failure
    ConnectionError,
    /// The URL cannot be requested at all
    InvalidUrl,
}

impl UrlStatus {
    /// Map an HTTP status code onto a URL status
    pub fn from_http_status(code: u16) -> Self {
        match code {
            200..=299 => UrlStatus::Accessible,
            401 | 403 => UrlStatus::NotAuthorized,
            404 | 410 => UrlStatus::NotFound,
            _ => UrlStatus::HttpError,
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UrlStatus::Unknown => "unknown",
            UrlStatus::Accessible => "accessible",
            UrlStatus::NotAuthorized => "not authorized",
            UrlStatus::NotFound => "not found",
            UrlStatus::HttpError => "http error",
            UrlStatus::ConnectionError => "connection error",
            UrlStatus::InvalidUrl => "invalid url",
        };
        f.write_str(text)
    }
}

/// Presence of a local file as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    /// Never stat-ed
    Unknown,
    /// Exists on disk
    Accessible,
    /// Missing
    Inaccessible,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FileStatus::Unknown => "unknown",
            FileStatus::Accessible => "accessible",
            FileStatus::Inaccessible => "inaccessible",
        };
        f.write_str(text)
    }
}

/// Snapshot of what is known about a remote URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlState {
    /// The resource URL (without cache-busting parameters)
    pub url: Url,
    /// Last observed status
    pub status: UrlStatus,
    /// Content length reported by the server, if any
    pub content_length: Option<u64>,
    /// Last-Modified reported by the server, if any
    pub last_modified: Option<DateTime<Utc>>,
    /// Whether the URL was actually queried during this session
    pub queried: bool,
}

impl UrlState {
    /// Initial state of a URL that has not been queried yet
    pub fn unknown(url: Url) -> Self {
        Self {
            url,
            status: UrlStatus::Unknown,
            content_length: None,
            last_modified: None,
            queried: false,
        }
    }

    /// State produced by a completed query
    pub fn queried(
        url: Url,
        status: UrlStatus,
        content_length: Option<u64>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            url,
            status,
            content_length,
            last_modified,
            queried: true,
        }
    }

    /// State produced by a query that failed before any response arrived
    pub fn failed(url: Url, status: UrlStatus) -> Self {
        Self::queried(url, status, None, None)
    }
}

/// Snapshot of what is known about a local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Absolute path inside the cache root
    pub path: PathBuf,
    /// Last observed status
    pub status: FileStatus,
    /// File length in bytes, when accessible
    pub length: Option<u64>,
    /// File modification time, when accessible
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileState {
    /// Initial state of a file that has not been stat-ed yet
    pub fn unknown(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Unknown,
            length: None,
            last_modified: None,
        }
    }

    /// State of an existing file
    pub fn accessible(
        path: impl Into<PathBuf>,
        length: u64,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Accessible,
            length: Some(length),
            last_modified,
        }
    }

    /// State of a missing file
    pub fn inaccessible(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Inaccessible,
            length: None,
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(UrlStatus::from_http_status(200), UrlStatus::Accessible);
        assert_eq!(UrlStatus::from_http_status(204), UrlStatus::Accessible);
        assert_eq!(UrlStatus::from_http_status(401), UrlStatus::NotAuthorized);
        assert_eq!(UrlStatus::from_http_status(403), UrlStatus::NotAuthorized);
        assert_eq!(UrlStatus::from_http_status(404), UrlStatus::NotFound);
        assert_eq!(UrlStatus::from_http_status(500), UrlStatus::HttpError);
        assert_eq!(UrlStatus::from_http_status(302), UrlStatus::HttpError);
    }

    #[test]
    fn test_states_are_value_equal() {
        let url = Url::parse("http://example.com/a.txt").unwrap();
        assert_eq!(UrlState::unknown(url.clone()), UrlState::unknown(url.clone()));
        assert_ne!(
            UrlState::unknown(url.clone()),
            UrlState::failed(url, UrlStatus::Unknown)
        );

        assert_eq!(
            FileState::inaccessible("/tmp/a"),
            FileState::inaccessible("/tmp/a")
        );
        assert_ne!(FileState::unknown("/tmp/a"), FileState::inaccessible("/tmp/a"));
    }
}
