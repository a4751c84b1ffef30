//! Combined querier producing the composite state of one resource

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::app::access::{FileAccessManager, UrlAccessManager};
use crate::app::info::DownloadableFileInfo;
use crate::app::state::DownloadableFileState;
use crate::errors::AccessResult;

use super::file::FileQuerier;
use super::url::UrlQuerier;

/// Runs the URL querier and the file querier for one resource
#[derive(Debug, Clone)]
pub struct DownloadableFileQuerier {
    info: Arc<DownloadableFileInfo>,
    url_querier: UrlQuerier,
    file_querier: FileQuerier,
}

impl DownloadableFileQuerier {
    pub fn new(
        urls: Arc<UrlAccessManager>,
        files: Arc<FileAccessManager>,
        info: Arc<DownloadableFileInfo>,
        force_update: bool,
    ) -> Self {
        let url_querier = UrlQuerier::new(urls, Arc::clone(info.url_info()), force_update);
        let file_querier = FileQuerier::new(files, Arc::clone(info.file_info()), force_update);
        Self {
            info,
            url_querier,
            file_querier,
        }
    }

    /// Check both sides concurrently and return the reconciled state
    ///
    /// # Errors
    ///
    /// Propagates local file-system failures; network failures are part of
    /// the returned state
    pub async fn query(&self) -> AccessResult<DownloadableFileState> {
        let (_, file_result) = tokio::join!(self.url_querier.query(), self.file_querier.query());
        file_result?;
        Ok(self.info.state())
    }

    pub fn query_in_background(&self) -> JoinHandle<AccessResult<DownloadableFileState>> {
        let querier = self.clone();
        tokio::spawn(async move { querier.query().await })
    }
}
