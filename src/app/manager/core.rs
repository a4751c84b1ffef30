//! The downloadable file manager: entry point for client code
//!
//! One manager owns a URL access manager, a file access manager and the cache
//! of composite cells. Callers ask it for resource state, trigger queries and
//! downloads, run the access monitor and register listeners.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::app::access::{FileAccessManager, UrlAccessManager};
use crate::app::client::{CredentialStore, Credentials};
use crate::app::download::{DownloadProgress, Downloader};
use crate::app::info::DownloadableFileInfo;
use crate::app::query::DownloadableFileQuerier;
use crate::app::state::DownloadableFileState;
use crate::errors::{AccessError, AccessResult, DownloadError, DownloadResult};

use super::config::ManagerConfig;
use super::delivery::DeliveryQueue;
use super::listener::ListenerRef;
use super::monitor::{AccessMonitor, InfoCache};

/// Entry point for querying and mirroring resources
#[derive(Debug)]
pub struct DownloadableFileManager {
    config: ManagerConfig,
    urls: Arc<UrlAccessManager>,
    files: Arc<FileAccessManager>,
    infos: InfoCache,
    delivery: DeliveryQueue,
    monitor: Mutex<Option<AccessMonitor>>,
}

impl DownloadableFileManager {
    /// Create a manager; must be called within a tokio runtime
    ///
    /// With `probe_on_start` the root URL is probed once and server access is
    /// disabled if it does not answer.
    ///
    /// # Errors
    ///
    /// Returns `AccessError` for an unusable root URL or cache directory
    pub async fn new(
        config: ManagerConfig,
        credentials: Arc<CredentialStore>,
    ) -> AccessResult<Self> {
        config.validate().map_err(|reason| AccessError::InvalidUrl {
            url: config.root_url.clone(),
            reason,
        })?;

        let urls = Arc::new(UrlAccessManager::new(
            &config.root_url,
            &config.client,
            credentials,
        )?);
        let files = Arc::new(FileAccessManager::new(config.cache_root.clone()).await?);

        if config.probe_on_start {
            urls.probe_root().await;
        }

        info!(
            "Downloadable file manager ready: {} -> {}",
            urls.root_url(),
            files.cache_root().display()
        );

        Ok(Self {
            config,
            urls,
            files,
            infos: Arc::new(Mutex::new(HashMap::new())),
            delivery: DeliveryQueue::start(),
            monitor: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn url_manager(&self) -> &Arc<UrlAccessManager> {
        &self.urls
    }

    pub fn file_manager(&self) -> &Arc<FileAccessManager> {
        &self.files
    }

    /// Canonical cache key for a URL string
    pub fn key_for(&self, url: &str) -> AccessResult<String> {
        Ok(self.urls.resolve(url)?.as_str().to_string())
    }

    /// The composite cell for `url`, created and wired on first access
    pub fn get_info(&self, url: &str) -> AccessResult<Arc<DownloadableFileInfo>> {
        let url = self.urls.resolve(url)?;
        let mut infos = self.infos.lock();
        if let Some(info) = infos.get(url.as_str()) {
            return Ok(Arc::clone(info));
        }

        let relative = self.urls.download_path(&url)?;
        let path = self.files.resolve_relative(&relative)?;
        debug!("Tracking {} at {}", url, path.display());

        let info = DownloadableFileInfo::new(self.urls.info(&url), self.files.info(&path));
        infos.insert(url.as_str().to_string(), Arc::clone(&info));
        Ok(info)
    }

    /// Current composite state without any I/O
    pub fn state(&self, url: &str) -> AccessResult<DownloadableFileState> {
        Ok(self.get_info(url)?.state())
    }

    /// URLs of every resource tracked so far, sorted
    pub fn known_urls(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = self
            .infos
            .lock()
            .values()
            .map(|info| info.url_info().url().clone())
            .collect();
        urls.sort();
        urls
    }

    /// Check the URL and the local file of one resource
    pub async fn query(
        &self,
        url: &str,
        force_update: bool,
    ) -> AccessResult<DownloadableFileState> {
        self.querier(url, force_update)?.query().await
    }

    /// Like [`query`](Self::query) but on the worker pool
    pub fn query_in_background(
        &self,
        url: &str,
        force_update: bool,
    ) -> AccessResult<JoinHandle<AccessResult<DownloadableFileState>>> {
        Ok(self.querier(url, force_update)?.query_in_background())
    }

    /// Make sure the local copy is current and return the resulting state
    ///
    /// With server access disabled and no `force_download`, the local state is
    /// refreshed and returned without contacting the server.
    pub async fn get_downloaded_file(
        &self,
        url: &str,
        force_download: bool,
    ) -> DownloadResult<DownloadableFileState> {
        let downloader = self.downloader(url, force_download)?;
        self.download_with(downloader, force_download).await
    }

    /// Start a download on the worker pool
    pub fn download_in_background(
        &self,
        url: &str,
        force_download: bool,
    ) -> DownloadResult<DownloadHandle> {
        let downloader = self.downloader(url, force_download)?;
        let progress = downloader.progress();
        let cancel = downloader.cancellation_token();
        let files = Arc::clone(&self.files);
        let server_access = self.urls.is_server_access_enabled();

        let task = tokio::spawn(async move {
            if !force_download && !server_access {
                return local_only_state(&files, downloader.info()).await;
            }
            downloader.download().await
        });

        Ok(DownloadHandle {
            progress,
            cancel,
            task,
        })
    }

    /// Start the access monitor; returns `false` if it is already running
    pub fn start_access_monitor(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if monitor.as_ref().map_or(false, |m| !m.is_finished()) {
            return false;
        }
        *monitor = Some(AccessMonitor::start(
            Arc::clone(&self.urls),
            Arc::clone(&self.files),
            Arc::clone(&self.infos),
            self.config.monitor_interval,
        ));
        true
    }

    /// Stop the access monitor; returns `false` if it was not running
    pub async fn stop_access_monitor(&self) -> bool {
        let monitor = self.monitor.lock().take();
        match monitor {
            Some(monitor) => {
                monitor.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub fn is_access_monitor_running(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .map_or(false, |m| !m.is_finished())
    }

    /// Register `listener` for changes of the resource behind `url`
    pub fn add_state_listener(&self, url: &str, listener: ListenerRef) -> AccessResult<()> {
        let info = self.get_info(url)?;
        let key = self.key_for(url)?;
        self.delivery.add(&key, &info, listener);
        Ok(())
    }

    /// Remove one registration of `listener`; `false` if none existed
    pub fn remove_state_listener(&self, url: &str, listener: &ListenerRef) -> AccessResult<bool> {
        let key = self.key_for(url)?;
        Ok(self.delivery.remove(&key, listener))
    }

    pub fn listener_count(&self, url: &str) -> AccessResult<usize> {
        Ok(self.delivery.listener_count(&self.key_for(url)?))
    }

    pub fn is_server_access_enabled(&self) -> bool {
        self.urls.is_server_access_enabled()
    }

    pub fn set_enable_server_access(&self, enabled: bool) {
        self.urls.set_enable_server_access(enabled);
    }

    /// Verify and install new credentials; see [`UrlAccessManager::update_credentials`]
    pub async fn update_credentials(&self, credentials: Credentials) -> bool {
        self.urls.update_credentials(credentials).await
    }

    fn querier(&self, url: &str, force_update: bool) -> AccessResult<DownloadableFileQuerier> {
        Ok(DownloadableFileQuerier::new(
            Arc::clone(&self.urls),
            Arc::clone(&self.files),
            self.get_info(url)?,
            force_update,
        ))
    }

    fn downloader(&self, url: &str, force_download: bool) -> AccessResult<Downloader> {
        Ok(Downloader::new(
            Arc::clone(&self.urls),
            Arc::clone(&self.files),
            self.get_info(url)?,
            force_download,
        )
        .retain_partial_downloads(self.config.retain_partial_downloads))
    }

    async fn download_with(
        &self,
        downloader: Downloader,
        force_download: bool,
    ) -> DownloadResult<DownloadableFileState> {
        if !force_download && !self.urls.is_server_access_enabled() {
            return local_only_state(&self.files, downloader.info()).await;
        }
        downloader.download().await
    }
}

impl Drop for DownloadableFileManager {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }
    }
}

async fn local_only_state(
    files: &FileAccessManager,
    info: &Arc<DownloadableFileInfo>,
) -> DownloadResult<DownloadableFileState> {
    debug!(
        "Server access disabled, serving local state of {}",
        info.url_info().url()
    );
    files.query_file_system(info.file_info(), false).await?;
    Ok(info.state())
}

/// A download running on the worker pool
#[derive(Debug)]
pub struct DownloadHandle {
    progress: watch::Receiver<DownloadProgress>,
    cancel: CancellationToken,
    task: JoinHandle<DownloadResult<DownloadableFileState>>,
}

impl DownloadHandle {
    pub fn progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this download, usable after the handle is consumed
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the download to end
    pub async fn wait(self) -> DownloadResult<DownloadableFileState> {
        self.task.await.map_err(|e| DownloadError::TaskFailed {
            reason: e.to_string(),
        })?
    }
}
