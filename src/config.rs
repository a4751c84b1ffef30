//! Configuration management for Resource Mirror
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, environment variables and command-line flags. Each TOML section is a
//! plain serde struct converted into the runtime configuration it feeds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::app::manager::ManagerConfig;
use crate::constants::{env, files, http, logging, monitor};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfigToml,
    pub cache: CacheConfigToml,
    pub client: ClientConfigToml,
    pub monitor: MonitorConfigToml,
    pub logging: LoggingConfig,
}

/// Remote side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfigToml {
    /// Root URL relative resource names are resolved against
    pub root_url: String,
    /// Probe the root at startup and work offline if it does not answer
    pub probe_on_start: bool,
}

impl Default for ServerConfigToml {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            probe_on_start: true,
        }
    }
}

/// Local side
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Cache directory path (None = OS cache directory)
    pub cache_root: Option<PathBuf>,
    /// Keep temporary files of failed downloads for debugging
    pub retain_partial_downloads: bool,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfigToml {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            connect_timeout_ms: http::CONNECT_TIMEOUT.as_millis() as u64,
            read_timeout_ms: http::READ_TIMEOUT.as_millis() as u64,
            user_agent: http::USER_AGENT.to_string(),
        }
    }
}

/// Access monitor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfigToml {
    pub interval_secs: u64,
    /// Start the monitor together with the manager
    pub enabled: bool,
}

impl Default for MonitorConfigToml {
    fn default() -> Self {
        Self {
            interval_secs: monitor::DEFAULT_INTERVAL.as_secs(),
            enabled: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            user_agent: self.user_agent.clone(),
            ..ClientConfig::default()
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, or the first one found)
    /// 3. Environment variables
    ///
    /// Command-line flags are applied by the caller afterwards.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Self::load_from_file(&path).await?
            }
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path).await?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings from `RESOURCE_MIRROR_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root_url) = std::env::var(env::ROOT_URL) {
            if !root_url.trim().is_empty() {
                debug!("Root URL taken from {}", env::ROOT_URL);
                self.server.root_url = root_url;
            }
        }
        if let Ok(cache_dir) = std::env::var(env::CACHE_DIR) {
            if !cache_dir.trim().is_empty() {
                debug!("Cache root taken from {}", env::CACHE_DIR);
                self.cache.cache_root = Some(PathBuf::from(cache_dir));
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Per-user config file path, if the OS has a config directory
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(files::APP_DIR_NAME)
                .join(files::CONFIG_FILE_NAME)
        })
    }

    /// Default cache directory when none is configured
    pub fn default_cache_root() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join(files::APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write a commented default config file
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> ConfigResult<()> {
        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: path.display().to_string(),
                reason: "File already exists; pass --force to overwrite".to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, Self::generate_default_config_content()).await?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Check values that would only fail later at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.root_url.trim().is_empty() {
            return Err(invalid(
                "server.root_url",
                "",
                "A root URL is required (config file, RESOURCE_MIRROR_ROOT_URL or --root-url)",
            ));
        }
        if url::Url::parse(self.server.root_url.trim()).is_err() {
            return Err(invalid(
                "server.root_url",
                &self.server.root_url,
                "Not an absolute URL",
            ));
        }
        if self.client.connect_timeout_ms == 0 || self.client.read_timeout_ms == 0 {
            return Err(invalid("client", "0", "Timeouts must be greater than 0"));
        }
        if self.monitor.interval_secs == 0 {
            return Err(invalid(
                "monitor.interval_secs",
                "0",
                "Interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Runtime configuration for the manager
    pub fn to_manager_config(&self) -> ConfigResult<ManagerConfig> {
        self.validate()?;
        let cache_root = self
            .cache
            .cache_root
            .clone()
            .unwrap_or_else(Self::default_cache_root);

        Ok(ManagerConfig::new(self.server.root_url.trim(), cache_root)
            .with_client(self.client.to_runtime_config())
            .with_monitor_interval(Duration::from_secs(self.monitor.interval_secs))
            .with_probe_on_start(self.server.probe_on_start)
            .with_retain_partial_downloads(self.cache.retain_partial_downloads))
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Resource Mirror configuration

[server]
# Root URL that relative resource names are resolved against
root_url = ""
# Probe the root at startup; work from the local cache if it does not answer
probe_on_start = true

[cache]
# Cache directory (leave commented to use {})
# cache_root = "/path/to/cache"
# Keep temporary files of failed or canceled downloads
retain_partial_downloads = false

[client]
connect_timeout_ms = {}
read_timeout_ms = {}
user_agent = "{}"

[monitor]
# Seconds between two re-query passes over all known resources
interval_secs = {}
enabled = false

[logging]
level = "{}"  # error, warn, info, debug, trace
"#,
            Self::default_cache_root().display(),
            http::CONNECT_TIMEOUT.as_millis(),
            http::READ_TIMEOUT.as_millis(),
            http::USER_AGENT,
            monitor::DEFAULT_INTERVAL.as_secs(),
            logging::DEFAULT_LOG_LEVEL,
        )
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
