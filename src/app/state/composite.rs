//! Composite remote + local verdict
//!
//! `DownloadableFileState` reconciles a `UrlState` and a `FileState` into the
//! answer client code actually wants: can the resource be used right now, and
//! does it have to be fetched again.

use serde::{Deserialize, Serialize};

use super::types::{FileState, FileStatus, UrlState, UrlStatus};

/// Immutable pairing of the latest URL state and file state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadableFileState {
    url_state: UrlState,
    file_state: FileState,
}

impl DownloadableFileState {
    pub fn new(url_state: UrlState, file_state: FileState) -> Self {
        Self {
            url_state,
            file_state,
        }
    }

    pub fn url_state(&self) -> &UrlState {
        &self.url_state
    }

    pub fn file_state(&self) -> &FileState {
        &self.file_state
    }

    /// Usable either from the local copy or from the server
    pub fn is_accessible(&self) -> bool {
        self.is_local_file_available() || self.is_url_accessible()
    }

    pub fn is_local_file_available(&self) -> bool {
        self.file_state.status == FileStatus::Accessible
    }

    pub fn is_url_accessible(&self) -> bool {
        self.url_state.status == UrlStatus::Accessible
    }

    pub fn is_url_unauthorized(&self) -> bool {
        self.url_state.status == UrlStatus::NotAuthorized
    }

    pub fn is_url_not_found(&self) -> bool {
        self.url_state.status == UrlStatus::NotFound
    }

    /// Whether the local copy must be (re)fetched
    ///
    /// A URL that was never queried this session is trusted to match the
    /// local copy, so a stale cached file is served instead of blocking on
    /// the network. Once queried, an accessible URL requires a download when
    /// the local file is missing or older than the server's copy; a queried
    /// but still unknown URL always requires one; any failure status falls
    /// back to local availability.
    pub fn is_download_necessary(&self) -> bool {
        let local_missing = !self.is_local_file_available();

        if !self.url_state.queried {
            return local_missing;
        }

        match self.url_state.status {
            UrlStatus::Accessible => local_missing || self.is_remote_newer(),
            UrlStatus::Unknown => true,
            _ => local_missing,
        }
    }

    fn is_remote_newer(&self) -> bool {
        match (self.url_state.last_modified, self.file_state.last_modified) {
            (Some(remote), Some(local)) => remote > local,
            _ => false,
        }
    }
}
