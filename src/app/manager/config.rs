//! Configuration for the downloadable file manager

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::client::ClientConfig;
use crate::constants::monitor;

/// Everything a manager needs besides credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Server root that relative URLs are resolved against
    pub root_url: String,
    /// Directory mirroring the server layout
    pub cache_root: PathBuf,
    /// HTTP client settings
    pub client: ClientConfig,
    /// Pause between two access monitor passes
    #[serde(with = "humantime_serde")]
    pub monitor_interval: Duration,
    /// Probe the root at construction and go local-only if it does not answer
    pub probe_on_start: bool,
    /// Keep temp files of failed or canceled downloads
    pub retain_partial_downloads: bool,
}

impl ManagerConfig {
    pub fn new(root_url: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root_url: root_url.into(),
            cache_root: cache_root.into(),
            client: ClientConfig::default(),
            monitor_interval: monitor::DEFAULT_INTERVAL,
            probe_on_start: true,
            retain_partial_downloads: false,
        }
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_probe_on_start(mut self, probe: bool) -> Self {
        self.probe_on_start = probe;
        self
    }

    pub fn with_retain_partial_downloads(mut self, retain: bool) -> Self {
        self.retain_partial_downloads = retain;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.root_url.trim().is_empty() {
            return Err("Root URL cannot be empty".to_string());
        }
        if self.cache_root.as_os_str().is_empty() {
            return Err("Cache root cannot be empty".to_string());
        }
        if self.monitor_interval.is_zero() {
            return Err("Monitor interval cannot be zero".to_string());
        }
        if self.client.read_timeout.is_zero() || self.client.connect_timeout.is_zero() {
            return Err("Timeouts cannot be zero".to_string());
        }
        Ok(())
    }
}
