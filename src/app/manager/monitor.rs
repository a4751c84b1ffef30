//! Access monitor: periodic re-query of every known resource

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::app::access::{FileAccessManager, UrlAccessManager};
use crate::app::info::DownloadableFileInfo;
use crate::app::query::DownloadableFileQuerier;
use crate::constants::monitor;

pub(crate) type InfoCache = Arc<Mutex<HashMap<String, Arc<DownloadableFileInfo>>>>;

/// Handle to the running monitor task
#[derive(Debug)]
pub struct AccessMonitor {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl AccessMonitor {
    /// Spawn the polling loop
    ///
    /// The first pass runs immediately; later passes start `interval` after
    /// the previous one began, or right after it if it ran longer.
    pub(crate) fn start(
        urls: Arc<UrlAccessManager>,
        files: Arc<FileAccessManager>,
        infos: InfoCache,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Access monitor started, interval {:?}", interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_pass(&urls, &files, &infos).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Access monitor received shutdown signal");
                        break;
                    }
                }
            }
            info!("Access monitor stopped");
        });

        Self { shutdown_tx, task }
    }

    /// Signal the loop and wait for it to finish the current pass
    pub async fn shutdown(self) {
        self.shutdown_within(monitor::TASK_SHUTDOWN_TIMEOUT).await;
    }

    /// Like [`shutdown`](Self::shutdown); a loop still busy after `limit` is aborted
    async fn shutdown_within(mut self, limit: Duration) {
        let _ = self.shutdown_tx.send(());
        if tokio::time::timeout(limit, &mut self.task).await.is_err() {
            warn!("Access monitor shutdown timed out after {:?}, aborting", limit);
            self.task.abort();
        }
    }

    /// Stop without waiting, for use where awaiting is impossible
    pub fn abort(self) {
        let _ = self.shutdown_tx.send(());
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Re-query every known resource once; failures are logged and skipped
async fn run_pass(urls: &Arc<UrlAccessManager>, files: &Arc<FileAccessManager>, infos: &InfoCache) {
    let snapshot: Vec<(String, Arc<DownloadableFileInfo>)> = infos
        .lock()
        .iter()
        .map(|(key, info)| (key.clone(), Arc::clone(info)))
        .collect();

    debug!("Access monitor pass over {} resources", snapshot.len());
    for (key, info) in snapshot {
        let querier =
            DownloadableFileQuerier::new(Arc::clone(urls), Arc::clone(files), info, true);
        if let Err(e) = querier.query().await {
            warn!("Access monitor failed to query {}: {}", key, e);
        }
    }
}
