//! Timed body streaming
//!
//! Wraps a response body so that every chunk must arrive within the read
//! timeout; a stalled server surfaces as an error instead of a hung task.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Response;

use crate::errors::{DownloadError, DownloadResult};

/// Response body yielding chunks, failing if one takes longer than the read timeout
pub struct ChunkStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    read_timeout: Duration,
}

impl ChunkStream {
    pub fn new(response: Response, read_timeout: Duration) -> Self {
        Self {
            inner: response.bytes_stream().boxed(),
            read_timeout,
        }
    }

    /// Next chunk, `None` at end of body
    pub async fn next_chunk(&mut self) -> DownloadResult<Option<Bytes>> {
        match tokio::time::timeout(self.read_timeout, self.inner.next()).await {
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
            Ok(Some(Err(e))) => Err(DownloadError::Http(e)),
            Ok(None) => Ok(None),
            Err(_) => Err(DownloadError::ReadTimeout {
                millis: self.read_timeout.as_millis() as u64,
            }),
        }
    }
}
