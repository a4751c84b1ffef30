//! Per-URL state cell

use url::Url;

use crate::app::state::UrlState;

use super::cell::{ObserverId, StateCell};

/// Latest known state of one remote URL
#[derive(Debug)]
pub struct UrlInfo {
    url: Url,
    cell: StateCell<UrlState>,
}

impl UrlInfo {
    pub fn new(url: Url) -> Self {
        let cell = StateCell::new(UrlState::unknown(url.clone()));
        Self { url, cell }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> UrlState {
        self.cell.get()
    }

    /// Replace the state; returns `true` if observers were notified
    pub fn update(&self, state: UrlState) -> bool {
        self.cell.set(state)
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&UrlState) + Send + Sync + 'static,
    {
        self.cell.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.cell.unsubscribe(id)
    }
}
