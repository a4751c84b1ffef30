//! Core HTTP operations: HEAD and GET with no-cache headers and timeouts
//!
//! Every request carries a cache-busting query parameter, `Accept: */*` and
//! no-cache directives, and the request-time credentials if any. Responses
//! are mapped onto [`UrlStatus`] values by a fixed table.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, CACHE_CONTROL, CONTENT_LENGTH, LAST_MODIFIED, PRAGMA};
use reqwest::{Client, Method, RequestBuilder, Response};
use url::Url;

use crate::app::client::auth::Credentials;
use crate::app::client::config::ClientConfig;
use crate::app::client::stream::ChunkStream;
use crate::app::state::{UrlState, UrlStatus};
use crate::constants::http;
use crate::errors::{AccessError, AccessResult};

/// HTTP operations handler
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
    read_timeout: Duration,
    connect_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler from the client configuration
    pub fn new(config: &ClientConfig) -> AccessResult<Self> {
        Ok(Self {
            client: config.build_http_client()?,
            read_timeout: config.read_timeout,
            connect_timeout: config.connect_timeout,
        })
    }

    /// Maximum wait between two body chunks
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Sends a HEAD request
    ///
    /// Only transport failures are errors; any HTTP status is returned as a
    /// response for the caller to map.
    pub async fn head(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> AccessResult<Response> {
        self.send(Method::HEAD, url, credentials).await
    }

    /// Sends a GET request and returns the response once headers arrived
    pub async fn get(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> AccessResult<Response> {
        self.send(Method::GET, url, credentials).await
    }

    /// Query a URL without transferring content and describe the outcome
    pub async fn query_state(&self, url: &Url, credentials: Option<&Credentials>) -> UrlState {
        match self.head(url, credentials).await {
            Ok(response) => url_state_from_response(url, &response),
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}", url, e);
                UrlState::failed(url.clone(), status_for_error(&e))
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> AccessResult<Response> {
        let request = self.build_request(method, url, credentials);
        let limit = self.connect_timeout + self.read_timeout;

        match tokio::time::timeout(limit, request.send()).await {
            Ok(Ok(response)) => {
                tracing::debug!("{} -> HTTP {}", url, response.status().as_u16());
                Ok(response)
            }
            Ok(Err(e)) if e.is_builder() => Err(AccessError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(AccessError::Connection {
                url: url.to_string(),
                source: e,
            }),
            Err(_) => Err(AccessError::Timeout {
                url: url.to_string(),
                millis: limit.as_millis() as u64,
            }),
        }
    }

    fn build_request(
        &self,
        method: Method,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, cache_busting_url(url))
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");

        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        request
    }

    /// Wrap a response body into a chunk stream enforcing the read timeout
    pub fn chunks(&self, response: Response) -> ChunkStream {
        ChunkStream::new(response, self.read_timeout)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Copy of `url` with a timestamp query parameter appended
pub fn cache_busting_url(url: &Url) -> Url {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut busted = url.clone();
    busted
        .query_pairs_mut()
        .append_pair(http::CACHE_BUST_PARAM, &stamp.to_string());
    busted
}

/// Describe a response as a queried `UrlState`
pub fn url_state_from_response(url: &Url, response: &Response) -> UrlState {
    let status = UrlStatus::from_http_status(response.status().as_u16());
    let headers = response.headers();
    if status == UrlStatus::Accessible {
        UrlState::queried(
            url.clone(),
            status,
            content_length(headers),
            last_modified(headers),
        )
    } else {
        UrlState::failed(url.clone(), status)
    }
}

/// Error describing a non-2xx response, `None` for success
pub fn error_for_status(url: &Url, code: u16) -> Option<AccessError> {
    let url = url.to_string();
    match UrlStatus::from_http_status(code) {
        UrlStatus::Accessible => None,
        UrlStatus::NotAuthorized => Some(AccessError::NotAuthorized { url }),
        UrlStatus::NotFound => Some(AccessError::NotFound { url }),
        _ => Some(AccessError::HttpStatus { url, status: code }),
    }
}

/// URL status recorded for a request that produced no usable response
pub fn status_for_error(error: &AccessError) -> UrlStatus {
    match error {
        AccessError::InvalidUrl { .. } => UrlStatus::InvalidUrl,
        AccessError::NotAuthorized { .. } => UrlStatus::NotAuthorized,
        AccessError::NotFound { .. } => UrlStatus::NotFound,
        AccessError::HttpStatus { .. } => UrlStatus::HttpError,
        AccessError::ServerAccessDisabled => UrlStatus::Unknown,
        _ => UrlStatus::ConnectionError,
    }
}

/// `Content-Length` header, parsed directly so HEAD responses report it too
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// `Last-Modified` header as a UTC timestamp
pub fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// Parse an RFC 7231 IMF-fixdate such as `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cache_busting_appends_parameter() {
        let url = Url::parse("http://example.com/data/a.txt?x=1").unwrap();
        let busted = cache_busting_url(&url);
        assert_eq!(busted.path(), "/data/a.txt");
        let pairs: Vec<(String, String)> = busted
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("x".to_string(), "1".to_string()));
        assert_eq!(pairs[1].0, http::CACHE_BUST_PARAM);
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn test_error_for_status() {
        let url = Url::parse("http://example.com/a").unwrap();
        assert!(error_for_status(&url, 200).is_none());
        assert!(matches!(
            error_for_status(&url, 401),
            Some(AccessError::NotAuthorized { .. })
        ));
        assert!(matches!(
            error_for_status(&url, 403),
            Some(AccessError::NotAuthorized { .. })
        ));
        assert!(matches!(
            error_for_status(&url, 404),
            Some(AccessError::NotFound { .. })
        ));
        assert!(matches!(
            error_for_status(&url, 500),
            Some(AccessError::HttpStatus { status: 500, .. })
        ));
    }

    #[test]
    fn test_status_for_error() {
        let timeout = AccessError::Timeout {
            url: "http://x".to_string(),
            millis: 10,
        };
        assert_eq!(status_for_error(&timeout), UrlStatus::ConnectionError);
        let invalid = AccessError::InvalidUrl {
            url: "x".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(status_for_error(&invalid), UrlStatus::InvalidUrl);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let config = ClientConfig {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let handler = HttpHandler::new(&config).unwrap();
        // Port 9 on localhost is the discard service and normally closed
        let url = Url::parse("http://127.0.0.1:9/missing").unwrap();
        let state = handler.query_state(&url, None).await;
        assert_eq!(state.status, UrlStatus::ConnectionError);
        assert!(state.queried);
    }
}
