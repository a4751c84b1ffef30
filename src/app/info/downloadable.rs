//! Composite cell derived from a URL cell and a file cell
//!
//! A `DownloadableFileInfo` observes its `UrlInfo` and `FileInfo`. Whenever
//! either changes, the composite is recomputed from the latest snapshot of
//! both, so it never lags behind an individual update.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::app::state::DownloadableFileState;

use super::cell::{ObserverId, StateCell};
use super::file_info::FileInfo;
use super::url_info::UrlInfo;

/// Reconciled state of one resource
#[derive(Debug)]
pub struct DownloadableFileInfo {
    url_info: Arc<UrlInfo>,
    file_info: Arc<FileInfo>,
    cell: StateCell<DownloadableFileState>,
    url_subscription: ObserverId,
    file_subscription: ObserverId,
    /// Serializes downloaders working on this resource
    download_lock: AsyncMutex<()>,
}

impl DownloadableFileInfo {
    /// Create the composite and wire it to both component cells
    pub fn new(url_info: Arc<UrlInfo>, file_info: Arc<FileInfo>) -> Arc<Self> {
        let info = Arc::new_cyclic(|weak: &Weak<Self>| {
            let on_url = weak.clone();
            let url_subscription = url_info.subscribe(move |_| {
                if let Some(info) = on_url.upgrade() {
                    info.refresh();
                }
            });

            let on_file = weak.clone();
            let file_subscription = file_info.subscribe(move |_| {
                if let Some(info) = on_file.upgrade() {
                    info.refresh();
                }
            });

            let initial = DownloadableFileState::new(url_info.state(), file_info.state());
            Self {
                url_info,
                file_info,
                cell: StateCell::new(initial),
                url_subscription,
                file_subscription,
                download_lock: AsyncMutex::new(()),
            }
        });
        // Catch component updates that landed before the subscriptions could upgrade
        info.refresh();
        info
    }

    pub fn url_info(&self) -> &Arc<UrlInfo> {
        &self.url_info
    }

    pub fn file_info(&self) -> &Arc<FileInfo> {
        &self.file_info
    }

    pub fn state(&self) -> DownloadableFileState {
        self.cell.get()
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&DownloadableFileState) + Send + Sync + 'static,
    {
        self.cell.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.cell.unsubscribe(id)
    }

    /// Recompute from the component cells; returns `true` if it changed
    pub fn refresh(&self) -> bool {
        self.cell.set_with(|| {
            DownloadableFileState::new(self.url_info.state(), self.file_info.state())
        })
    }

    pub(crate) async fn lock_download(&self) -> AsyncMutexGuard<'_, ()> {
        self.download_lock.lock().await
    }
}

impl Drop for DownloadableFileInfo {
    fn drop(&mut self) {
        self.url_info.unsubscribe(self.url_subscription);
        self.file_info.unsubscribe(self.file_subscription);
    }
}
