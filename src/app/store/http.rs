//! HTTP object store with rate limiting and retry logic
//!
//! Objects are fetched with plain GET requests, ranged through the `Range`
//! header, and streamed straight to disk. Throttling (429), overload (503) and
//! connection failures are retried with exponential backoff; every other
//! status is mapped to a [`TransferFailure`] and returned immediately.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Method, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::app::range::ByteRange;
use crate::constants::limits;
use crate::errors::{ConfigError, ConfigResult, TransferFailure};

use super::config::ClientConfig;
use super::{object_url, ObjectStore};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// Object store reached over HTTP(S)
#[derive(Debug)]
pub struct HttpObjectStore {
    client: Client,
    rate_limiter: DirectRateLimiter,
    config: ClientConfig,
}

impl HttpObjectStore {
    /// Creates a store with an HTTP client built from `config`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the client cannot be built or the rate limit
    /// is zero
    pub fn new(config: ClientConfig) -> ConfigResult<Self> {
        let client = config.build_http_client()?;
        Self::with_client(client, config)
    }

    /// Creates a store around an existing client
    pub fn with_client(client: Client, config: ClientConfig) -> ConfigResult<Self> {
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let quota = Quota::per_second(NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: rate_limit_rps.to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            }
        })?);
        Ok(RateLimiter::direct(quota))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url_for(&self, source: &str) -> Result<Url, TransferFailure> {
        object_url(source, self.config.s3_endpoint.as_deref())
    }

    fn backoff_delay(retries: u32) -> Duration {
        let factor = 2_u64.checked_pow(retries).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(limits::RETRY_BASE_DELAY_MS.saturating_mul(factor));
        delay.min(Duration::from_secs(limits::MAX_BACKOFF_SECS))
    }

    fn map_request_error(&self, e: reqwest::Error) -> TransferFailure {
        if e.is_timeout() {
            TransferFailure::Timeout {
                seconds: self.config.request_timeout.as_secs(),
            }
        } else {
            TransferFailure::Network(e.to_string())
        }
    }

    /// Sends a request with rate limiting and retry logic
    ///
    /// Returns the raw response for any status other than 429/503.
    async fn send(
        &self,
        method: Method,
        url: &Url,
        range: Option<ByteRange>,
    ) -> Result<Response, TransferFailure> {
        // Apply rate limiting with jitter to avoid thundering herd
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let max_retries = self.config.max_retries;
        let mut retries = 0;
        loop {
            let mut request = self.client.request(method.clone(), url.as_str());
            if let Some(range) = range {
                request = request.header(RANGE, range.http_header());
            }
            if self.config.disable_cache {
                request = request.header(CACHE_CONTROL, "no-cache");
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let throttled = status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE;

                    if !throttled {
                        debug!("{} {} -> {}", method, url, status);
                        return Ok(response);
                    }

                    if retries >= max_retries {
                        error!("{} {} still {} after {} retries", method, url, status, retries);
                        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                            TransferFailure::RateLimited
                        } else {
                            TransferFailure::Http {
                                status: status.as_u16(),
                            }
                        });
                    }

                    retries += 1;
                    let delay = Self::backoff_delay(retries);
                    warn!(
                        "Server returned {} for {}. Backing off for {}ms",
                        status,
                        url,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if retries < max_retries && (e.is_connect() || e.is_timeout()) => {
                    retries += 1;
                    let delay = Self::backoff_delay(retries);
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("Request to {} failed: {}", url, e);
                    return Err(self.map_request_error(e));
                }
            }
        }
    }
}

/// Part of a body chunk starting at object offset `offset` that lies in `range`
fn clip_to_range(chunk: &[u8], offset: u64, range: ByteRange) -> &[u8] {
    let chunk_end = offset + chunk.len() as u64;
    let from = range.start().clamp(offset, chunk_end);
    let to = range.end().unwrap_or(chunk_end).clamp(from, chunk_end);
    &chunk[(from - offset) as usize..(to - offset) as usize]
}

/// Map a non-success status to a failure
fn check_status(status: StatusCode) -> Result<(), TransferFailure> {
    match status.as_u16() {
        200 | 206 => Ok(()),
        404 => Err(TransferFailure::NotFound),
        401 | 403 => Err(TransferFailure::PermissionDenied {
            status: status.as_u16(),
        }),
        416 => Err(TransferFailure::RangeNotSatisfiable),
        other => Err(TransferFailure::Http { status: other }),
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn copy(
        &self,
        source: &str,
        dest: &Path,
        range: Option<ByteRange>,
    ) -> Result<u64, TransferFailure> {
        let url = self.url_for(source)?;
        let response = self.send(Method::GET, &url, range).await?;
        check_status(response.status())?;

        // 200 to a ranged GET carries the whole object
        let window = range.filter(|_| response.status() == StatusCode::OK);
        if let Some(range) = window {
            warn!(
                "Server ignored Range header for {}; keeping bytes {} of the full object",
                url, range
            );
        }

        let mut file = File::create(dest).await?;
        let mut written = 0_u64;
        let mut position = 0_u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.map_request_error(e))?;
            let offset = position;
            position += chunk.len() as u64;

            let bytes = match window {
                Some(range) => clip_to_range(&chunk, offset, range),
                None => &chunk[..],
            };
            file.write_all(bytes).await?;
            written += bytes.len() as u64;

            if window
                .and_then(|range| range.end())
                .is_some_and(|end| position >= end)
            {
                break;
            }
        }
        file.flush().await?;

        if window.is_some_and(|range| position <= range.start()) {
            return Err(TransferFailure::RangeNotSatisfiable);
        }

        debug!("Wrote {} bytes from {} to {}", written, url, dest.display());
        Ok(written)
    }

    async fn size(&self, source: &str) -> Result<u64, TransferFailure> {
        let url = self.url_for(source)?;
        let response = self.send(Method::HEAD, &url, None).await?;
        check_status(response.status())?;

        // Response::content_length reflects the (empty) HEAD body, not the header
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or(TransferFailure::SizeUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response; the handle yields the raw request
    async fn serve_once(
        status: &str,
        headers: &str,
        body: &'static [u8],
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
            status,
            body.len(),
            headers
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(head.as_bytes()).await.unwrap();
            if !String::from_utf8_lossy(&request).starts_with("HEAD") {
                socket.write_all(body).await.unwrap();
            }
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn test_store(config: ClientConfig) -> HttpObjectStore {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpObjectStore::with_client(client, config).unwrap()
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        let result = HttpObjectStore::build_rate_limiter(0);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpObjectStore::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let base = limits::RETRY_BASE_DELAY_MS;
        assert_eq!(HttpObjectStore::backoff_delay(1).as_millis() as u64, base * 2);
        assert_eq!(HttpObjectStore::backoff_delay(2).as_millis() as u64, base * 4);
        assert_eq!(HttpObjectStore::backoff_delay(3).as_millis() as u64, base * 8);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let cap = Duration::from_secs(limits::MAX_BACKOFF_SECS);
        assert_eq!(HttpObjectStore::backoff_delay(20), cap);
        assert_eq!(HttpObjectStore::backoff_delay(64), cap);
        assert_eq!(HttpObjectStore::backoff_delay(u32::MAX), cap);
    }

    #[test]
    fn test_clip_to_range() {
        let range = ByteRange::bounded(10, 15).unwrap();
        assert_eq!(clip_to_range(b"0123456789", 0, range), b"");
        assert_eq!(clip_to_range(b"0123456789", 8, range), b"23456");
        assert_eq!(clip_to_range(b"0123456789", 13, range), b"01");
        assert_eq!(clip_to_range(b"0123", 20, range), b"");
        assert_eq!(clip_to_range(b"0123456789", 5, ByteRange::to_end(12)), b"789");
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(check_status(StatusCode::PARTIAL_CONTENT).is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND),
            Err(TransferFailure::NotFound)
        ));
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN),
            Err(TransferFailure::PermissionDenied { status: 403 })
        ));
        assert!(matches!(
            check_status(StatusCode::RANGE_NOT_SATISFIABLE),
            Err(TransferFailure::RangeNotSatisfiable)
        ));
        assert!(matches!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(TransferFailure::Http { status: 500 })
        ));
    }

    #[tokio::test]
    async fn test_ranged_copy_sends_range_header() {
        let (base, server) =
            serve_once("206 Partial Content", "Content-Range: bytes 10-14/100\r\n", b"GRIB2").await;
        let store = test_store(ClientConfig {
            disable_cache: true,
            ..Default::default()
        });
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("field.grib2");

        let written = store
            .copy(
                &format!("{}/bucket/field.grib2", base),
                &dest,
                Some(ByteRange::bounded(10, 15).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"GRIB2");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /bucket/field.grib2"));
        assert!(request.contains("range: bytes=10-14"));
        assert!(request.contains("cache-control: no-cache"));
    }

    #[tokio::test]
    async fn test_full_response_to_ranged_copy_is_trimmed() {
        let (base, _server) = serve_once("200 OK", "", b"0123456789ABCDEFGHIJ").await;
        let store = test_store(ClientConfig::default());
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("field.grib2");

        let written = store
            .copy(
                &format!("{}/bucket/field.grib2", base),
                &dest,
                Some(ByteRange::bounded(10, 15).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"ABCDE");
    }

    #[tokio::test]
    async fn test_full_response_to_open_ended_copy_is_trimmed() {
        let (base, _server) = serve_once("200 OK", "", b"0123456789ABCDEFGHIJ").await;
        let store = test_store(ClientConfig::default());
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("last.grib2");

        let written = store
            .copy(
                &format!("{}/bucket/last.grib2", base),
                &dest,
                Some(ByteRange::to_end(16)),
            )
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"GHIJ");
    }

    #[tokio::test]
    async fn test_full_response_shorter_than_range_start() {
        let (base, _server) = serve_once("200 OK", "", b"0123456789").await;
        let store = test_store(ClientConfig::default());
        let temp_dir = TempDir::new().unwrap();

        let result = store
            .copy(
                &format!("{}/bucket/short.grib2", base),
                &temp_dir.path().join("short.grib2"),
                Some(ByteRange::bounded(30, 40).unwrap()),
            )
            .await;
        assert!(matches!(result, Err(TransferFailure::RangeNotSatisfiable)));
    }

    #[tokio::test]
    async fn test_s3_endpoint_and_not_found() {
        let (base, server) = serve_once("404 Not Found", "", b"").await;
        let store = test_store(ClientConfig {
            s3_endpoint: Some(base),
            ..Default::default()
        });
        let temp_dir = TempDir::new().unwrap();

        let result = store
            .copy("s3://bucket/missing.idx", &temp_dir.path().join("x"), None)
            .await;
        assert!(matches!(result, Err(TransferFailure::NotFound)));

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /bucket/missing.idx"));
        assert!(!request.contains("range:"));
    }

    #[tokio::test]
    async fn test_size_reads_content_length() {
        let (base, _server) = serve_once("200 OK", "", b"0123456789").await;
        let store = test_store(ClientConfig::default());

        let size = store.size(&format!("{}/bucket/x.grib2", base)).await.unwrap();
        assert_eq!(size, 10);
    }
}
