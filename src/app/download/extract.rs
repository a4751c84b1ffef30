//! Zip extraction into a sibling directory named after the archive

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::app::access::path::strip_suffix_ignore_case;
use crate::constants::files::{TEMP_FILE_SUFFIX, ZIP_SUFFIX};
use crate::errors::{DownloadError, DownloadResult};

use super::types::{DownloadPhase, DownloadProgress, ProgressReporter};

/// Unpacks one downloaded archive
///
/// Entries are written to a temporary directory beside the target and the
/// directory is renamed into place once every entry is out, so a canceled or
/// failed extraction never leaves a half-filled target behind.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    archive: PathBuf,
    target: PathBuf,
    cancel: CancellationToken,
    progress: ProgressReporter,
}

impl ArchiveExtractor {
    /// Extractor for `archive`, or `None` if it is not a `.zip` file
    pub fn for_archive(
        archive: &Path,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> Option<Self> {
        let target = extraction_target(archive)?;
        Some(Self {
            archive: archive.to_path_buf(),
            target,
            cancel,
            progress,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Extract on the blocking pool
    ///
    /// Returns `Ok(false)` when the target directory already exists.
    pub async fn extract(self) -> DownloadResult<bool> {
        tokio::task::spawn_blocking(move || self.extract_blocking())
            .await
            .map_err(|e| DownloadError::TaskFailed {
                reason: e.to_string(),
            })?
    }

    fn extract_blocking(&self) -> DownloadResult<bool> {
        if self.target.is_dir() {
            debug!("{} already extracted", self.target.display());
            return Ok(false);
        }

        self.progress.enter(DownloadPhase::Unzipping);
        let staging = staging_dir(&self.target);

        match self.unpack_into(&staging) {
            Ok(()) => {
                fs::rename(&staging, &self.target).map_err(|e| {
                    let _ = fs::remove_dir_all(&staging);
                    DownloadError::Io(e)
                })?;
                info!(
                    "Extracted {} into {}",
                    self.archive.display(),
                    self.target.display()
                );
                Ok(true)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(
                            "Failed to remove staging directory {}: {}",
                            staging.display(),
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn unpack_into(&self, staging: &Path) -> DownloadResult<()> {
        let file = File::open(&self.archive)?;
        let mut archive = ZipArchive::new(file).map_err(|e| self.extraction_error(e))?;
        let total = archive.len() as u64;
        fs::create_dir_all(staging)?;

        for index in 0..archive.len() {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::Canceled);
            }

            let mut entry = archive
                .by_index(index)
                .map_err(|e| self.extraction_error(e))?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!("Skipping unsafe archive entry {}", entry.name());
                continue;
            };
            let out_path = staging.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out_file = File::create(&out_path)?;
                copy_cancellable(&mut entry, &mut out_file, &self.cancel)?;
            }

            self.progress.report(DownloadProgress::running(
                DownloadPhase::Unzipping,
                index as u64 + 1,
                Some(total),
            ));
        }
        Ok(())
    }

    fn extraction_error(&self, error: zip::result::ZipError) -> DownloadError {
        DownloadError::Extraction {
            archive: self.archive.clone(),
            reason: error.to_string(),
        }
    }
}

/// `foo.zip` → `foo`, `None` for anything that is not a zip archive
pub fn extraction_target(archive: &Path) -> Option<PathBuf> {
    let name = archive.file_name()?.to_str()?;
    let stem = strip_suffix_ignore_case(name, ZIP_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(archive.with_file_name(stem))
}

fn staging_dir(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(
        "{}.{:08x}{}",
        name,
        fastrand::u32(..),
        TEMP_FILE_SUFFIX
    ))
}

/// Buffer size for entry copies; cancel is checked once per buffer
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// `io::copy` that stops with `Canceled` between buffers
fn copy_cancellable<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> DownloadResult<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(DownloadError::Canceled);
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(copied),
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Reader that cancels `token` once it has handed out its first buffer
    struct CancelAfterFirstRead {
        remaining: usize,
        reads: usize,
        token: CancellationToken,
    }

    impl Read for CancelAfterFirstRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.reads == 1 {
                self.token.cancel();
            }
            self.reads += 1;
            let n = buf.len().min(self.remaining);
            buf[..n].fill(1);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_large_entry_copy_stops_on_cancel() {
        let token = CancellationToken::new();
        let mut reader = CancelAfterFirstRead {
            remaining: 16 * COPY_BUFFER_SIZE,
            reads: 0,
            token: token.clone(),
        };
        let mut written = Vec::new();

        let error = copy_cancellable(&mut reader, &mut written, &token).unwrap_err();
        assert!(error.is_canceled());
        assert!(written.len() < 16 * COPY_BUFFER_SIZE);
        assert_eq!(written.len(), 2 * COPY_BUFFER_SIZE);
    }

    #[test]
    fn test_copy_without_cancel_is_complete() {
        let token = CancellationToken::new();
        let content = vec![9u8; COPY_BUFFER_SIZE + 17];
        let mut written = Vec::new();
        let copied = copy_cancellable(&mut content.as_slice(), &mut written, &token).unwrap();
        assert_eq!(copied, content.len() as u64);
        assert_eq!(written, content);
    }

    #[test]
    fn test_extraction_target() {
        assert_eq!(
            extraction_target(Path::new("/cache/data.zip")),
            Some(PathBuf::from("/cache/data"))
        );
        assert_eq!(
            extraction_target(Path::new("/cache/DATA.ZIP")),
            Some(PathBuf::from("/cache/DATA"))
        );
        assert_eq!(extraction_target(Path::new("/cache/data.txt")), None);
        assert_eq!(extraction_target(Path::new("/cache/.zip")), None);
    }

    #[tokio::test]
    async fn test_extracts_entries_and_reports_progress() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_archive(
            &archive,
            &[("a.txt", b"alpha"), ("nested/b.txt", b"beta")],
        );

        let reporter = ProgressReporter::new();
        let extractor =
            ArchiveExtractor::for_archive(&archive, CancellationToken::new(), reporter.clone())
                .unwrap();
        assert!(extractor.extract().await.unwrap());

        let target = dir.path().join("bundle");
        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(target.join("nested/b.txt")).unwrap(), b"beta");

        let progress = reporter.current();
        assert_eq!(progress.phase, DownloadPhase::Unzipping);
        assert_eq!(progress.bytes_transferred, 2);
        assert_eq!(progress.percent, 99);
    }

    #[tokio::test]
    async fn test_existing_target_is_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_archive(&archive, &[("a.txt", b"new")]);
        let target = dir.path().join("bundle");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("a.txt"), b"old").unwrap();

        let extractor = ArchiveExtractor::for_archive(
            &archive,
            CancellationToken::new(),
            ProgressReporter::new(),
        )
        .unwrap();
        assert!(!extractor.extract().await.unwrap());
        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_canceled_extraction_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_archive(&archive, &[("a.txt", b"alpha")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let extractor =
            ArchiveExtractor::for_archive(&archive, cancel, ProgressReporter::new()).unwrap();
        let error = extractor.extract().await.unwrap_err();
        assert!(error.is_canceled());

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let extractor = ArchiveExtractor::for_archive(
            &archive,
            CancellationToken::new(),
            ProgressReporter::new(),
        )
        .unwrap();
        assert!(matches!(
            extractor.extract().await,
            Err(DownloadError::Extraction { .. })
        ));
        assert!(!dir.path().join("broken").exists());
    }
}
