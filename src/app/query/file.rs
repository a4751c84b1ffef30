//! File-system querier

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::app::access::FileAccessManager;
use crate::app::info::FileInfo;
use crate::app::state::FileState;
use crate::errors::AccessResult;

/// Re-stats one local file, subject to the unknown/forced gating
#[derive(Debug, Clone)]
pub struct FileQuerier {
    manager: Arc<FileAccessManager>,
    info: Arc<FileInfo>,
    force_update: bool,
}

impl FileQuerier {
    pub fn new(manager: Arc<FileAccessManager>, info: Arc<FileInfo>, force_update: bool) -> Self {
        Self {
            manager,
            info,
            force_update,
        }
    }

    /// Stat the file and update its cell
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Io` for failures other than a missing file
    pub async fn query(&self) -> AccessResult<FileState> {
        self.manager
            .query_file_system(&self.info, self.force_update)
            .await
    }

    pub fn query_in_background(&self) -> JoinHandle<AccessResult<FileState>> {
        let querier = self.clone();
        tokio::spawn(async move { querier.query().await })
    }
}
