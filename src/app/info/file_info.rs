//! Per-path state cell

use std::path::{Path, PathBuf};

use crate::app::state::FileState;

use super::cell::{ObserverId, StateCell};

/// Latest known state of one local file
#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    cell: StateCell<FileState>,
}

impl FileInfo {
    pub fn new(path: PathBuf) -> Self {
        let cell = StateCell::new(FileState::unknown(path.clone()));
        Self { path, cell }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> FileState {
        self.cell.get()
    }

    pub fn update(&self, state: FileState) -> bool {
        self.cell.set(state)
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&FileState) + Send + Sync + 'static,
    {
        self.cell.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.cell.unsubscribe(id)
    }
}
