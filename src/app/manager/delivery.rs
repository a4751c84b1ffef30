//! Listener delivery on a single consumer task
//!
//! Cell observers run on whichever task changed the cell. They only enqueue
//! an event; one consumer task drains the queue and calls the listeners, so
//! listener code never runs on a querier or downloader task and sees events
//! in the order they were produced.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::app::info::{DownloadableFileInfo, ObserverId};
use crate::app::state::DownloadableFileState;

use super::listener::{same_listener, ListenerRef};

#[derive(Debug)]
struct StateEvent {
    key: String,
    state: DownloadableFileState,
}

/// Listeners of one resource plus the cell subscription feeding them
struct Registration {
    info: Arc<DownloadableFileInfo>,
    observer: ObserverId,
    listeners: Vec<ListenerRef>,
}

/// Listener registry with its delivery task
pub struct DeliveryQueue {
    sender: mpsc::UnboundedSender<StateEvent>,
    registrations: Arc<Mutex<HashMap<String, Registration>>>,
    task: JoinHandle<()>,
}

impl DeliveryQueue {
    /// Start the consumer task; must be called within a tokio runtime
    pub fn start() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<StateEvent>();
        let registrations: Arc<Mutex<HashMap<String, Registration>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let lookup = Arc::clone(&registrations);
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let listeners: Vec<ListenerRef> = lookup
                    .lock()
                    .get(&event.key)
                    .map(|r| r.listeners.clone())
                    .unwrap_or_default();
                trace!(
                    "Delivering state of {} to {} listeners",
                    event.key,
                    listeners.len()
                );
                for listener in listeners {
                    // A panicking listener must not take the delivery task down with it
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| listener.respond(&event.state)));
                    if outcome.is_err() {
                        error!("State listener for {} panicked; continuing", event.key);
                    }
                }
            }
            debug!("Listener delivery task finished");
        });

        Self {
            sender,
            registrations,
            task,
        }
    }

    /// Add a listener for the resource behind `info`
    ///
    /// The first listener of a resource subscribes to its cell.
    pub fn add(&self, key: &str, info: &Arc<DownloadableFileInfo>, listener: ListenerRef) {
        let mut registrations = self.registrations.lock();
        if let Some(registration) = registrations.get_mut(key) {
            registration.listeners.push(listener);
            return;
        }

        let sender = self.sender.clone();
        let event_key = key.to_string();
        let observer = info.subscribe(move |state| {
            // Receiver gone means the manager is shutting down
            let _ = sender.send(StateEvent {
                key: event_key.clone(),
                state: state.clone(),
            });
        });

        registrations.insert(
            key.to_string(),
            Registration {
                info: Arc::clone(info),
                observer,
                listeners: vec![listener],
            },
        );
    }

    /// Remove one registration of `listener`; the last one unsubscribes
    pub fn remove(&self, key: &str, listener: &ListenerRef) -> bool {
        let mut registrations = self.registrations.lock();
        let Some(registration) = registrations.get_mut(key) else {
            return false;
        };
        let Some(index) = registration
            .listeners
            .iter()
            .position(|l| same_listener(l, listener))
        else {
            return false;
        };

        registration.listeners.remove(index);
        if registration.listeners.is_empty() {
            if let Some(registration) = registrations.remove(key) {
                registration.info.unsubscribe(registration.observer);
            }
        }
        true
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.registrations
            .lock()
            .get(key)
            .map_or(0, |r| r.listeners.len())
    }
}

impl Drop for DeliveryQueue {
    fn drop(&mut self) {
        for (_, registration) in self.registrations.lock().drain() {
            registration.info.unsubscribe(registration.observer);
        }
        self.task.abort();
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("resources", &self.registrations.lock().len())
            .finish()
    }
}
