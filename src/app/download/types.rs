//! Download phase and progress types

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::constants::progress::{DONE_PERCENT, MAX_PHASE_PERCENT};

/// Lifecycle of one downloader
///
/// `Idle → Connecting → Transferring → (Unzipping) → Done | Canceled | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadPhase {
    Idle,
    Connecting,
    Transferring,
    Unzipping,
    Done,
    Canceled,
    Failed,
}

impl DownloadPhase {
    /// True once no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Failed)
    }
}

impl std::fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Transferring => "downloading",
            Self::Unzipping => "unzipping",
            Self::Done => "done",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Snapshot of a running download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub phase: DownloadPhase,
    /// Percentage of the current phase; only `Done` reports 100
    pub percent: u8,
    /// Bytes (or archive entries while unzipping) processed in this phase
    pub bytes_transferred: u64,
    /// Total for this phase, if known
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn idle() -> Self {
        Self::at(DownloadPhase::Idle)
    }

    /// Phase entered with nothing processed yet
    pub fn at(phase: DownloadPhase) -> Self {
        Self {
            phase,
            percent: if phase == DownloadPhase::Done {
                DONE_PERCENT
            } else {
                0
            },
            bytes_transferred: 0,
            total_bytes: None,
        }
    }

    /// Progress within a running phase, capped below 100%
    pub fn running(phase: DownloadPhase, done: u64, total: Option<u64>) -> Self {
        Self {
            phase,
            percent: phase_percent(done, total),
            bytes_transferred: done,
            total_bytes: total,
        }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::idle()
    }
}

/// Percentage of `done` against `total`, never above the running cap
pub fn phase_percent(done: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            let percent = done.saturating_mul(100) / total;
            percent.min(u64::from(MAX_PHASE_PERCENT)) as u8
        }
        _ => 0,
    }
}

/// Publishes progress snapshots to any number of watchers
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Arc<watch::Sender<DownloadProgress>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DownloadProgress::idle());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> DownloadProgress {
        self.sender.borrow().clone()
    }

    /// Publish a snapshot, skipping no-op updates
    pub fn report(&self, progress: DownloadProgress) {
        self.sender.send_if_modified(|current| {
            if *current == progress {
                false
            } else {
                *current = progress;
                true
            }
        });
    }

    pub fn enter(&self, phase: DownloadPhase) {
        self.report(DownloadProgress::at(phase));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
