//! State listeners and per-owner registration tracking

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::app::state::DownloadableFileState;
use crate::errors::AccessResult;

use super::core::DownloadableFileManager;

/// Receives composite state changes on the delivery task
pub trait StateListener: Send + Sync {
    fn respond(&self, state: &DownloadableFileState);
}

impl<F> StateListener for F
where
    F: Fn(&DownloadableFileState) + Send + Sync,
{
    fn respond(&self, state: &DownloadableFileState) {
        self(state)
    }
}

/// Shared handle to a listener; identity is the allocation, not the value
pub type ListenerRef = Arc<dyn StateListener>;

/// True if both handles point at the same listener
pub fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Remembers what one owner registered so it can all be undone at once
///
/// Registering the same listener twice for one URL is a no-op. Dropping the
/// tracker removes every registration it made.
pub struct ListenerTracker {
    manager: Arc<DownloadableFileManager>,
    registrations: Mutex<HashMap<String, Vec<ListenerRef>>>,
}

impl ListenerTracker {
    pub fn new(manager: Arc<DownloadableFileManager>) -> Self {
        Self {
            manager,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Register `listener` for `url`; returns `false` if it already was
    pub fn add(&self, url: &str, listener: ListenerRef) -> AccessResult<bool> {
        let key = self.manager.key_for(url)?;
        let mut registrations = self.registrations.lock();
        let listeners = registrations.entry(key).or_default();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return Ok(false);
        }

        self.manager.add_state_listener(url, Arc::clone(&listener))?;
        listeners.push(listener);
        Ok(true)
    }

    /// Undo one registration; returns `false` if it was not tracked
    pub fn remove(&self, url: &str, listener: &ListenerRef) -> AccessResult<bool> {
        let key = self.manager.key_for(url)?;
        let mut registrations = self.registrations.lock();
        let Some(listeners) = registrations.get_mut(&key) else {
            return Ok(false);
        };
        let Some(index) = listeners.iter().position(|l| same_listener(l, listener)) else {
            return Ok(false);
        };

        listeners.remove(index);
        if listeners.is_empty() {
            registrations.remove(&key);
        }
        self.manager.remove_state_listener(&key, listener)
    }

    /// Undo every registration made through this tracker
    pub fn remove_all(&self) {
        let registrations = std::mem::take(&mut *self.registrations.lock());
        let mut removed = 0;
        for (key, listeners) in registrations {
            for listener in listeners {
                if let Ok(true) = self.manager.remove_state_listener(&key, &listener) {
                    removed += 1;
                }
            }
        }
        debug!("Listener tracker removed {} registrations", removed);
    }

    /// Number of tracked (URL, listener) pairs
    pub fn len(&self) -> usize {
        self.registrations.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ListenerTracker {
    fn drop(&mut self) {
        self.remove_all();
    }
}

impl std::fmt::Debug for ListenerTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTracker")
            .field("registrations", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_identity_is_the_allocation() {
        let first: ListenerRef = Arc::new(|_: &DownloadableFileState| {});
        let copy = Arc::clone(&first);
        let second: ListenerRef = Arc::new(|_: &DownloadableFileState| {});

        assert!(same_listener(&first, &copy));
        assert!(!same_listener(&first, &second));
    }
}
