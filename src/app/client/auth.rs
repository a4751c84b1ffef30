//! Request-time credential context
//!
//! Credentials are never installed process-wide. A `CredentialStore` is shared
//! by the application and the URL access manager; every request takes a
//! snapshot of the store, so concurrent requests observe either the old or the
//! new credentials, never a half-applied swap.

use std::env;
use std::fmt;

use parking_lot::RwLock;

use crate::constants::env as env_constants;

/// Username/password pair sent as HTTP basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load credentials from environment variables, if both are set
    pub fn from_env() -> Option<Self> {
        let username = env::var(env_constants::USERNAME).ok()?;
        let password = env::var(env_constants::PASSWORD).ok()?;
        if username.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Shared, swappable holder of the credentials used for outgoing requests
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Option<Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
        }
    }

    /// Store seeded from `RESOURCE_MIRROR_USERNAME` / `RESOURCE_MIRROR_PASSWORD`
    pub fn from_env() -> Self {
        Self {
            current: RwLock::new(Credentials::from_env()),
        }
    }

    /// Snapshot used for a single request
    pub fn snapshot(&self) -> Option<Credentials> {
        self.current.read().clone()
    }

    /// Replace the stored credentials, returning the previous ones
    pub fn replace(&self, credentials: Option<Credentials>) -> Option<Credentials> {
        std::mem::replace(&mut *self.current.write(), credentials)
    }

    pub fn is_set(&self) -> bool {
        self.current.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_store_replace_returns_previous() {
        let store = CredentialStore::with_credentials(Credentials::new("a", "1"));
        assert!(store.is_set());

        let previous = store.replace(Some(Credentials::new("b", "2")));
        assert_eq!(previous, Some(Credentials::new("a", "1")));
        assert_eq!(store.snapshot(), Some(Credentials::new("b", "2")));

        store.replace(None);
        assert!(!store.is_set());
    }
}
