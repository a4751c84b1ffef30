//! Progress bars for downloads
//!
//! One indicatif bar per download, driven by the downloader's progress
//! receiver. The bar shows bytes while transferring and entries while
//! unzipping, and is cleared with a final message when the download ends.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::download::{DownloadPhase, DownloadProgress};
use crate::errors::{AppError, Result};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.green} {prefix:20!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}";
const PHASE_TEMPLATE: &str = "{spinner:.green} {prefix:20!} {msg}";

/// Set of progress bars sharing the terminal
#[derive(Clone)]
pub struct ProgressDisplay {
    multi: MultiProgress,
    transfer_style: ProgressStyle,
    phase_style: ProgressStyle,
}

impl ProgressDisplay {
    pub fn new() -> Result<Self> {
        let transfer_style = ProgressStyle::default_bar()
            .template(TRANSFER_TEMPLATE)
            .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
            .progress_chars("##-");
        let phase_style = ProgressStyle::default_spinner()
            .template(PHASE_TEMPLATE)
            .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?;

        Ok(Self {
            multi: MultiProgress::new(),
            transfer_style,
            phase_style,
        })
    }

    /// Follow `progress` on a new bar until the download reaches a terminal phase
    pub fn follow(
        &self,
        label: &str,
        mut progress: watch::Receiver<DownloadProgress>,
    ) -> JoinHandle<()> {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.phase_style.clone());
        bar.set_prefix(shorten(label, 20));
        let transfer_style = self.transfer_style.clone();
        let phase_style = self.phase_style.clone();

        tokio::spawn(async move {
            let mut showing_transfer = false;
            loop {
                let current = progress.borrow_and_update().clone();
                match (current.phase, current.total_bytes) {
                    (DownloadPhase::Transferring, Some(total)) => {
                        if !showing_transfer {
                            bar.set_style(transfer_style.clone());
                            showing_transfer = true;
                        }
                        bar.set_length(total);
                        bar.set_position(current.bytes_transferred);
                        bar.set_message(String::new());
                    }
                    (phase, _) => {
                        if showing_transfer {
                            bar.set_style(phase_style.clone());
                            showing_transfer = false;
                        }
                        bar.set_message(describe(&current, phase));
                        bar.tick();
                    }
                }

                if current.phase.is_terminal() {
                    bar.finish_with_message(describe(&current, current.phase));
                    break;
                }
                if progress.changed().await.is_err() {
                    bar.finish_and_clear();
                    break;
                }
            }
        })
    }
}

fn describe(progress: &DownloadProgress, phase: DownloadPhase) -> String {
    match phase {
        DownloadPhase::Transferring => {
            format!("{} ({} bytes)", phase, progress.bytes_transferred)
        }
        DownloadPhase::Unzipping => format!("{} {}%", phase, progress.percent),
        _ => phase.to_string(),
    }
}

/// Keep the tail of long labels, which is usually the file name
fn shorten(label: &str, width: usize) -> String {
    let count = label.chars().count();
    if count <= width {
        return label.to_string();
    }
    let tail: String = label.chars().skip(count - (width - 1)).collect();
    format!("…{}", tail)
}
