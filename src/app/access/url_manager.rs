//! URL access manager
//!
//! Owns the URL → [`UrlInfo`] cache, the global server-access switch and the
//! request-time credentials. Resolution and path derivation are purely
//! syntactic; only [`UrlAccessManager::probe_root`],
//! [`UrlAccessManager::fetch_state`] and the credential check touch the
//! network.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::client::{ClientConfig, CredentialStore, Credentials, HttpHandler};
use crate::app::info::UrlInfo;
use crate::app::state::{UrlState, UrlStatus};
use crate::errors::{AccessError, AccessResult};

use super::path::relative_download_path;

/// Cache of URL cells anchored at a server root
#[derive(Debug)]
pub struct UrlAccessManager {
    root_url: Url,
    http: HttpHandler,
    credentials: Arc<CredentialStore>,
    server_access: AtomicBool,
    infos: Mutex<HashMap<String, Arc<UrlInfo>>>,
}

impl UrlAccessManager {
    /// Create a manager rooted at `root_url`
    ///
    /// Server access starts enabled; call [`probe_root`](Self::probe_root) to
    /// decide based on actual reachability.
    pub fn new(
        root_url: &str,
        client_config: &ClientConfig,
        credentials: Arc<CredentialStore>,
    ) -> AccessResult<Self> {
        let root_url = parse_root(root_url)?;
        let http = HttpHandler::new(client_config)?;

        info!("Initialized URL access manager with root: {}", root_url);

        Ok(Self {
            root_url,
            http,
            credentials,
            server_access: AtomicBool::new(true),
            infos: Mutex::new(HashMap::new()),
        })
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    pub fn http(&self) -> &HttpHandler {
        &self.http
    }

    /// Turn a URL string into a URL, relative strings being anchored at the root
    pub fn resolve(&self, url: &str) -> AccessResult<Url> {
        let trimmed = url.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return Err(AccessError::InvalidUrl {
                url: url.to_string(),
                reason: "empty or contains control characters".to_string(),
            });
        }

        if has_protocol(trimmed) {
            return Url::parse(trimmed).map_err(|e| AccessError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        self.root_url
            .join(trimmed.trim_start_matches('/'))
            .map_err(|e| AccessError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Relative local path under which `url` is mirrored
    pub fn download_path(&self, url: &Url) -> AccessResult<PathBuf> {
        relative_download_path(&self.root_url, url)
    }

    /// The cell for `url`, created on first access
    pub fn info(&self, url: &Url) -> Arc<UrlInfo> {
        let mut infos = self.infos.lock();
        Arc::clone(
            infos
                .entry(url.as_str().to_string())
                .or_insert_with(|| Arc::new(UrlInfo::new(url.clone()))),
        )
    }

    /// All cells created so far
    pub fn known_infos(&self) -> Vec<Arc<UrlInfo>> {
        self.infos.lock().values().cloned().collect()
    }

    pub fn is_server_access_enabled(&self) -> bool {
        self.server_access.load(Ordering::SeqCst)
    }

    pub fn set_enable_server_access(&self, enabled: bool) {
        let previous = self.server_access.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(
                "Server access {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Credentials used for the next request
    pub fn current_credentials(&self) -> Option<Credentials> {
        self.credentials.snapshot()
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Query `url` over the network with the current credentials
    ///
    /// Never fails: transport problems are reported through the status.
    /// Does not consult the server-access switch; callers do.
    pub async fn fetch_state(&self, url: &Url) -> UrlState {
        if url.scheme() == "file" {
            return local_url_state(url).await;
        }
        let credentials = self.credentials.snapshot();
        self.http.query_state(url, credentials.as_ref()).await
    }

    /// Probe the root URL and enable server access only if it answers
    ///
    /// Any HTTP response counts as reachable, except an authorization
    /// failure. On failure the manager keeps working in local-only mode.
    pub async fn probe_root(&self) -> bool {
        let state = self.fetch_state(&self.root_url).await;
        let reachable = is_reachable(state.status);
        if reachable {
            debug!("Root {} reachable ({})", self.root_url, state.status);
        } else {
            warn!(
                "Root {} not usable ({}); continuing in local-only mode",
                self.root_url, state.status
            );
        }
        self.set_enable_server_access(reachable);
        reachable
    }

    /// Check `candidate` against the root without installing it
    pub async fn verify_credentials(&self, candidate: &Credentials) -> bool {
        let state = self
            .http
            .query_state(&self.root_url, Some(candidate))
            .await;
        debug!(
            "Credential check for {} against {}: {}",
            candidate.username, self.root_url, state.status
        );
        is_reachable(state.status)
    }

    /// Verify `candidate` and commit it only if the server accepts it
    ///
    /// Requests issued while the check runs keep using the previous
    /// credentials; nothing is rolled back because nothing unverified was
    /// ever installed.
    pub async fn update_credentials(&self, candidate: Credentials) -> bool {
        if !self.verify_credentials(&candidate).await {
            warn!("Rejected credentials for user {}", candidate.username);
            return false;
        }
        info!("Accepted credentials for user {}", candidate.username);
        self.credentials.replace(Some(candidate));
        self.set_enable_server_access(true);
        true
    }
}

fn is_reachable(status: UrlStatus) -> bool {
    !matches!(
        status,
        UrlStatus::ConnectionError
            | UrlStatus::InvalidUrl
            | UrlStatus::NotAuthorized
            | UrlStatus::Unknown
    )
}

fn parse_root(root_url: &str) -> AccessResult<Url> {
    let mut text = root_url.trim().to_string();
    if !text.ends_with('/') {
        text.push('/');
    }
    let url = Url::parse(&text).map_err(|e| AccessError::InvalidUrl {
        url: root_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(AccessError::InvalidUrl {
            url: root_url.to_string(),
            reason: "root URL cannot be used as a base".to_string(),
        });
    }
    Ok(url)
}

/// `scheme://...` or `file:...`; a single letter before `:` is a drive letter
fn has_protocol(text: &str) -> bool {
    match text.find(':') {
        Some(index) if index > 1 => {
            let scheme = &text[..index];
            scheme
                .chars()
                .next()
                .map_or(false, |c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

async fn local_url_state(url: &Url) -> UrlState {
    let Ok(path) = url.to_file_path() else {
        return UrlState::failed(url.clone(), UrlStatus::InvalidUrl);
    };
    match tokio::fs::metadata(&path).await {
        Ok(metadata) => UrlState::queried(
            url.clone(),
            UrlStatus::Accessible,
            Some(metadata.len()),
            metadata.modified().ok().map(Into::into),
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            UrlState::failed(url.clone(), UrlStatus::NotFound)
        }
        Err(_) => UrlState::failed(url.clone(), UrlStatus::ConnectionError),
    }
}
