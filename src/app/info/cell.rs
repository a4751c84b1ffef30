//! Latest-state holder with change observers
//!
//! A `StateCell` keeps one snapshot and a list of observers. Replacing the
//! snapshot with a value-equal one is a no-op; any other replacement notifies
//! every observer exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by [`StateCell::subscribe`]
pub type ObserverId = u64;

type Observer<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Mutable cell holding the most recent snapshot of some state
///
/// The snapshot and the observer list are guarded by separate locks. A third
/// lock serializes "swap then notify" so observers of one cell see changes in
/// the order they were applied. Observers must not write to the cell that is
/// notifying them.
pub struct StateCell<S> {
    state: Mutex<S>,
    observers: Mutex<Vec<(ObserverId, Observer<S>)>>,
    ordering: Mutex<()>,
    next_id: AtomicU64,
}

impl<S> StateCell<S>
where
    S: Clone + PartialEq,
{
    pub fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
            ordering: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> S {
        self.state.lock().clone()
    }

    /// Replace the snapshot, notifying observers if it changed
    ///
    /// Returns `true` when observers were notified.
    pub fn set(&self, new_state: S) -> bool {
        self.set_with(|| new_state)
    }

    /// Compute and replace the snapshot while holding the ordering lock
    ///
    /// Used when the new value is derived from other cells: computing under
    /// the lock guarantees the last writer also computed from the latest
    /// inputs.
    pub fn set_with<F>(&self, compute: F) -> bool
    where
        F: FnOnce() -> S,
    {
        let _ordering = self.ordering.lock();
        let new_state = compute();

        {
            let mut current = self.state.lock();
            if *current == new_state {
                return false;
            }
            *current = new_state.clone();
        }

        let observers: Vec<Observer<S>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&new_state);
        }
        true
    }

    /// Register an observer called after every actual change
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer; returns `false` if it was not registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl<S: fmt::Debug> fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("state", &*self.state.lock())
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}
