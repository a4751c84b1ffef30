//! File access manager
//!
//! Owns the path → [`FileInfo`] cache for one cache root. Every path handed
//! out is inside the root; files are stat-ed only when their state is unknown
//! or a refresh is forced.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, error, info};

use crate::app::info::FileInfo;
use crate::app::state::{FileState, FileStatus};
use crate::errors::{AccessError, AccessResult};

/// Sandboxed cache of file cells under a root directory
#[derive(Debug)]
pub struct FileAccessManager {
    cache_root: PathBuf,
    infos: Mutex<HashMap<PathBuf, Arc<FileInfo>>>,
}

impl FileAccessManager {
    /// Create a manager rooted at `cache_root`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Io` if the directory cannot be created or resolved
    pub async fn new(cache_root: impl Into<PathBuf>) -> AccessResult<Self> {
        let cache_root = cache_root.into();
        Self::ensure_directory_exists(&cache_root).await?;
        let cache_root = fs::canonicalize(&cache_root).await?;

        info!(
            "Initialized file access manager with root: {}",
            cache_root.display()
        );

        Ok(Self {
            cache_root,
            infos: Mutex::new(HashMap::new()),
        })
    }

    /// Ensure a directory exists, creating it if necessary
    async fn ensure_directory_exists(path: &Path) -> AccessResult<()> {
        if !path.exists() {
            fs::create_dir_all(path).await.map_err(|e| {
                error!("Failed to create cache directory {}: {}", path.display(), e);
                e
            })?;
            debug!("Created cache directory: {}", path.display());
        }
        Ok(())
    }

    /// Get the cache root directory
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Resolve a path string against the cache root
    ///
    /// Relative strings are joined to the root. A string that already names
    /// the root is accepted as absolute only if the root really is one of its
    /// ancestors, so `/cache-other/x` does not pass for `/cache`.
    pub fn resolve(&self, path: &str) -> AccessResult<PathBuf> {
        let candidate = Path::new(path);

        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(AccessError::PathEscapesRoot {
                path: candidate.to_path_buf(),
            });
        }

        let root_text = self.cache_root.to_string_lossy();
        if candidate.is_absolute() || path.starts_with(root_text.as_ref()) {
            return if candidate.ancestors().any(|a| a == self.cache_root) {
                Ok(candidate.to_path_buf())
            } else {
                Err(AccessError::PathEscapesRoot {
                    path: candidate.to_path_buf(),
                })
            };
        }

        Ok(self.cache_root.join(candidate))
    }

    /// Absolute path for a relative download path
    pub fn resolve_relative(&self, relative: &Path) -> AccessResult<PathBuf> {
        self.resolve(&relative.to_string_lossy())
    }

    /// The cell for `path`, created on first access
    pub fn info(&self, path: &Path) -> Arc<FileInfo> {
        let mut infos = self.infos.lock();
        Arc::clone(
            infos
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(FileInfo::new(path.to_path_buf()))),
        )
    }

    /// All cells created so far
    pub fn known_infos(&self) -> Vec<Arc<FileInfo>> {
        self.infos.lock().values().cloned().collect()
    }

    /// Refresh a cell from disk when unknown or forced
    ///
    /// Returns the cached snapshot untouched otherwise.
    pub async fn query_file_system(
        &self,
        info: &FileInfo,
        force_update: bool,
    ) -> AccessResult<FileState> {
        let current = info.state();
        if !force_update && current.status != FileStatus::Unknown {
            return Ok(current);
        }

        let state = stat(info.path()).await?;
        info.update(state.clone());
        Ok(state)
    }
}

/// Stat a path into a `FileState`; a missing path is not an error
pub async fn stat(path: &Path) -> io::Result<FileState> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(FileState::accessible(
            path,
            metadata.len(),
            metadata.modified().ok().map(Into::into),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileState::inaccessible(path)),
        Err(e) => Err(e),
    }
}
