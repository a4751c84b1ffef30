//! Downloader: conditional, atomic transfer of one resource to the cache
//!
//! A download runs through `Connecting → Transferring → (Unzipping) → Done`.
//! Content is streamed into a randomly named temporary file beside the
//! destination and promoted with a rename only after the whole body arrived,
//! so the previous good copy survives any failure or cancel.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use flate2::write::GzDecoder;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::access::path::is_gzip_url;
use crate::app::access::{FileAccessManager, UrlAccessManager};
use crate::app::client::http::{error_for_status, status_for_error, url_state_from_response};
use crate::app::client::ChunkStream;
use crate::app::info::DownloadableFileInfo;
use crate::app::query::DownloadableFileQuerier;
use crate::app::state::{DownloadableFileState, UrlState, UrlStatus};
use crate::constants::files::TEMP_FILE_SUFFIX;
use crate::errors::{AccessError, DownloadError, DownloadResult};

use super::extract::ArchiveExtractor;
use super::types::{DownloadPhase, DownloadProgress, ProgressReporter};

const LOCAL_READ_BUFFER: usize = 64 * 1024;

/// Transfers one resource when its local copy is missing or out of date
#[derive(Debug, Clone)]
pub struct Downloader {
    urls: Arc<UrlAccessManager>,
    files: Arc<FileAccessManager>,
    info: Arc<DownloadableFileInfo>,
    force_download: bool,
    retain_partial: bool,
    cancel: CancellationToken,
    progress: ProgressReporter,
}

impl Downloader {
    pub fn new(
        urls: Arc<UrlAccessManager>,
        files: Arc<FileAccessManager>,
        info: Arc<DownloadableFileInfo>,
        force_download: bool,
    ) -> Self {
        Self {
            urls,
            files,
            info,
            force_download,
            retain_partial: false,
            cancel: CancellationToken::new(),
            progress: ProgressReporter::new(),
        }
    }

    /// Keep the temporary file of a failed or canceled transfer for inspection
    pub fn retain_partial_downloads(mut self, retain: bool) -> Self {
        self.retain_partial = retain;
        self
    }

    pub fn info(&self) -> &Arc<DownloadableFileInfo> {
        &self.info
    }

    /// Request cancellation; observed at the next chunk or archive entry
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Run on the worker pool
    pub fn download_in_background(&self) -> JoinHandle<DownloadResult<DownloadableFileState>> {
        let downloader = self.clone();
        tokio::spawn(async move { downloader.download().await })
    }

    /// Download if necessary and return the resulting composite state
    ///
    /// # Errors
    ///
    /// `DownloadError::Canceled` after [`cancel`](Self::cancel); access errors
    /// when the resource cannot be fetched; I/O errors from the cache. In every
    /// error case the previous local file is left untouched.
    pub async fn download(&self) -> DownloadResult<DownloadableFileState> {
        let url = self.info.url_info().url().clone();
        let destination = self.info.file_info().path().to_path_buf();

        if is_same_local_file(&url, &destination) {
            debug!("{} is its own cache entry, nothing to download", url);
            self.progress.enter(DownloadPhase::Done);
            return Ok(self.info.state());
        }

        let _guard = self.info.lock_download().await;

        let result = self.run(&url, &destination).await;
        match &result {
            Ok(_) => self.complete(),
            Err(e) if e.is_canceled() => {
                info!("Download of {} canceled", url);
                self.progress.enter(DownloadPhase::Canceled);
            }
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                self.progress.enter(DownloadPhase::Failed);
            }
        }
        result
    }

    async fn run(&self, url: &Url, destination: &Path) -> DownloadResult<DownloadableFileState> {
        if url.scheme() != "file" && !self.urls.is_server_access_enabled() {
            return Err(AccessError::ServerAccessDisabled.into());
        }

        if !self.force_download {
            let state = DownloadableFileQuerier::new(
                Arc::clone(&self.urls),
                Arc::clone(&self.files),
                Arc::clone(&self.info),
                true,
            )
            .query()
            .await?;

            let url_unknown = state.url_state().status == UrlStatus::Unknown;
            if !state.is_download_necessary() && !url_unknown {
                debug!("{} is up to date", destination.display());
                return Ok(state);
            }
            if let Some(error) = access_error_for(state.url_state()) {
                return Err(error.into());
            }
        }

        self.check_canceled()?;
        self.progress.enter(DownloadPhase::Connecting);
        let source = self.open(url).await?;

        self.transfer(url, source, destination).await?;

        self.files
            .query_file_system(self.info.file_info(), true)
            .await?;

        if let Some(extractor) =
            ArchiveExtractor::for_archive(destination, self.cancel.clone(), self.progress.clone())
        {
            extractor.extract().await?;
        }

        Ok(self.info.state())
    }

    /// Open the body, recording what the response says about the URL
    async fn open(&self, url: &Url) -> DownloadResult<Source> {
        if url.scheme() == "file" {
            return self.open_local(url).await;
        }

        let credentials = self.urls.current_credentials();
        let response = match self.urls.http().get(url, credentials.as_ref()).await {
            Ok(response) => response,
            Err(e) => {
                self.info
                    .url_info()
                    .update(UrlState::failed(url.clone(), status_for_error(&e)));
                return Err(e.into());
            }
        };

        let state = url_state_from_response(url, &response);
        self.info.url_info().update(state.clone());
        if let Some(error) = error_for_status(url, response.status().as_u16()) {
            return Err(error.into());
        }

        Ok(Source {
            body: Body::Remote(self.urls.http().chunks(response)),
            length: state.content_length,
            last_modified: state.last_modified,
        })
    }

    async fn open_local(&self, url: &Url) -> DownloadResult<Source> {
        let path = url.to_file_path().map_err(|_| AccessError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local path".to_string(),
        })?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.info
                    .url_info()
                    .update(UrlState::failed(url.clone(), UrlStatus::NotFound));
                return Err(AccessError::NotFound {
                    url: url.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        Ok(Source {
            body: Body::Local(file),
            length: Some(metadata.len()),
            last_modified,
        })
    }

    /// Stream `source` into a temp file and promote it to `destination`
    async fn transfer(&self, url: &Url, source: Source, destination: &Path) -> DownloadResult<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = temp_path_for(destination);

        let outcome = self
            .stream_to_temp(url, source.body, source.length, &temp_path)
            .await
            .map(|received| (received, source.last_modified));

        let result = match outcome {
            Ok((received, last_modified)) => {
                debug!(
                    "Received {} bytes for {}, promoting to {}",
                    received,
                    url,
                    destination.display()
                );
                promote(&temp_path, destination, last_modified).await
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.discard(&temp_path).await;
        } else {
            info!("Downloaded {} to {}", url, destination.display());
        }
        result
    }

    /// Copy the body chunk by chunk, returning the number of wire bytes
    async fn stream_to_temp(
        &self,
        url: &Url,
        mut body: Body,
        length: Option<u64>,
        temp_path: &Path,
    ) -> DownloadResult<u64> {
        let mut file = fs::File::create(temp_path).await?;
        let mut decoder = ContentDecoder::for_url(url);
        let mut received: u64 = 0;

        self.progress
            .report(DownloadProgress::running(DownloadPhase::Transferring, 0, length));

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DownloadError::Canceled),
                chunk = body.next_chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            received += chunk.len() as u64;
            let decoded = decoder.feed(chunk)?;
            if !decoded.is_empty() {
                file.write_all(&decoded).await?;
            }
            self.progress.report(DownloadProgress::running(
                DownloadPhase::Transferring,
                received,
                length,
            ));
        }

        if let Some(expected) = length {
            if received != expected {
                return Err(DownloadError::IncompleteDownload { received, expected });
            }
        }

        let tail = decoder.finish()?;
        if !tail.is_empty() {
            file.write_all(&tail).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(received)
    }

    async fn discard(&self, temp_path: &Path) {
        if self.retain_partial {
            info!("Keeping partial download {}", temp_path.display());
            return;
        }
        match fs::remove_file(temp_path).await {
            Ok(()) => debug!("Removed partial download {}", temp_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove partial download {}: {}",
                temp_path.display(),
                e
            ),
        }
    }

    fn check_canceled(&self) -> DownloadResult<()> {
        if self.cancel.is_cancelled() {
            Err(DownloadError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Snap to 100% while keeping the last counters
    fn complete(&self) {
        let mut progress = self.progress.current();
        progress.phase = DownloadPhase::Done;
        progress.percent = crate::constants::progress::DONE_PERCENT;
        self.progress.report(progress);
    }
}

struct Source {
    body: Body,
    length: Option<u64>,
    last_modified: Option<DateTime<Utc>>,
}

enum Body {
    Remote(ChunkStream),
    Local(fs::File),
}

impl Body {
    async fn next_chunk(&mut self) -> DownloadResult<Option<Bytes>> {
        match self {
            Body::Remote(stream) => stream.next_chunk().await,
            Body::Local(file) => {
                let mut buffer = vec![0u8; LOCAL_READ_BUFFER];
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    Ok(None)
                } else {
                    buffer.truncate(read);
                    Ok(Some(Bytes::from(buffer)))
                }
            }
        }
    }
}

/// Transparent gzip decoding for `.gz` resources
enum ContentDecoder {
    Identity,
    Gzip(GzDecoder<Vec<u8>>),
}

impl ContentDecoder {
    fn for_url(url: &Url) -> Self {
        if is_gzip_url(url) {
            Self::Gzip(GzDecoder::new(Vec::new()))
        } else {
            Self::Identity
        }
    }

    fn feed(&mut self, chunk: Bytes) -> io::Result<Bytes> {
        match self {
            Self::Identity => Ok(chunk),
            Self::Gzip(decoder) => {
                decoder.write_all(&chunk)?;
                Ok(Bytes::from(std::mem::take(decoder.get_mut())))
            }
        }
    }

    fn finish(self) -> io::Result<Bytes> {
        match self {
            Self::Identity => Ok(Bytes::new()),
            Self::Gzip(decoder) => decoder.finish().map(Bytes::from),
        }
    }
}

/// Replace `destination` with `temp_path` and restore the remote timestamp
async fn promote(
    temp_path: &Path,
    destination: &Path,
    last_modified: Option<DateTime<Utc>>,
) -> DownloadResult<()> {
    let mtime = last_modified.map(|t| FileTime::from_system_time(SystemTime::from(t)));
    if let Some(mtime) = mtime {
        filetime::set_file_mtime(temp_path, mtime)?;
    }

    // rename replaces an existing destination in one step
    fs::rename(temp_path, destination).await.map_err(|e| {
        warn!("Failed to rename temporary file: {}", e);
        DownloadError::AtomicOperationFailed {
            temp_path: temp_path.to_path_buf(),
            final_path: destination.to_path_buf(),
        }
    })?;

    // Some file systems touch the mtime on rename
    if let Some(mtime) = mtime {
        let metadata = fs::metadata(destination).await?;
        if FileTime::from_last_modification_time(&metadata) != mtime {
            filetime::set_file_mtime(destination, mtime)?;
        }
    }
    Ok(())
}

/// Unique temporary sibling of `destination`
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(
        "{}.{:08x}{}",
        name,
        fastrand::u32(..),
        TEMP_FILE_SUFFIX
    ))
}

/// Error matching a failed remote status, `None` when a transfer may be tried
fn access_error_for(state: &UrlState) -> Option<AccessError> {
    let url = state.url.to_string();
    match state.status {
        UrlStatus::NotAuthorized => Some(AccessError::NotAuthorized { url }),
        UrlStatus::NotFound => Some(AccessError::NotFound { url }),
        UrlStatus::InvalidUrl => Some(AccessError::InvalidUrl {
            url,
            reason: "rejected by the server check".to_string(),
        }),
        _ => None,
    }
}

fn is_same_local_file(url: &Url, destination: &Path) -> bool {
    if url.scheme() != "file" {
        return false;
    }
    match url.to_file_path() {
        Ok(source) => {
            source == destination
                || match (source.canonicalize(), destination.canonicalize()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
        }
        Err(_) => false,
    }
}
