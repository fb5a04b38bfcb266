//! Small GET client for pulling a vigilance feed or page, with retries.
//!
//! Network errors, `429` and `5xx` responses are retried with exponential
//! backoff. A numeric `Retry-After` header replaces the computed delay.
//! Setting `VIGILANCE_HTTP_RAW=1` logs every response body (capped) under
//! the `http.raw` target.
//!
//! ```no_run
//! # async fn demo() -> Result<(), vigilance_http::HttpError> {
//! let client = vigilance_http::HttpClient::new("https://example.org/vigilance/")?;
//! let fetched = client
//!     .get_bytes("alerts-raw.json", vigilance_http::RequestOpts::default())
//!     .await?;
//! println!("{} bytes", fetched.body.len());
//! # Ok(()) }
//! ```

use std::env;
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

const RAW_ENV: &str = "VIGILANCE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const BACKOFF_BASE_MS: u64 = 200;
/// Minimum pause after a `429` without `Retry-After`.
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client setup failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server answered {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Network(m) if m.starts_with(TIMED_OUT))
    }
}

const TIMED_OUT: &str = "request timed out";

/// Per-request overrides of the client defaults.
///
/// ```
/// use vigilance_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     ..Default::default()
/// };
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
}

/// A successful response.
#[derive(Clone, Debug)]
pub struct Fetched {
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Outcome of a single attempt, before the retry decision.
enum Attempt {
    Done(Fetched),
    Failed {
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
    },
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    default_timeout: Duration,
    max_retries: usize,
}

impl HttpClient {
    /// Client anchored at `base`; 15 s per attempt and two retries by default.
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("vigilance/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET `path` resolved against the base URL; an empty path fetches the base itself.
    pub async fn get_bytes(&self, path: &str, opts: RequestOpts) -> Result<Fetched, HttpError> {
        let url = if path.is_empty() {
            self.base.clone()
        } else {
            self.base
                .join(path)
                .map_err(|e| HttpError::Url(e.to_string()))?
        };
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);

        let mut retries = 0usize;
        loop {
            debug!(
                attempt = retries + 1,
                max_retries,
                url = %url,
                timeout_ms = timeout.as_millis() as u64,
                "http.request.start"
            );

            let delay = match self.attempt(&url, timeout, opts.headers.as_ref()).await {
                Ok(Attempt::Done(fetched)) => return Ok(fetched),
                Ok(Attempt::Failed {
                    status,
                    headers,
                    body,
                }) => {
                    let message = error_message(&body);
                    match retry_delay(status, &headers, retries + 1) {
                        Some(delay) if retries < max_retries => {
                            warn!(%status, attempt = retries + 1, backoff_ms = delay.as_millis() as u64, %message, "http.retrying");
                            delay
                        }
                        _ => {
                            warn!(%status, %message, "http.error");
                            return Err(HttpError::Api { status, message });
                        }
                    }
                }
                Err(err) => {
                    let message = describe(&err);
                    if retries >= max_retries {
                        warn!(attempts = retries + 1, %message, "http.network_error");
                        return Err(HttpError::Network(message));
                    }
                    let delay = backoff(retries + 1);
                    warn!(attempt = retries + 1, backoff_ms = delay.as_millis() as u64, %message, "http.retrying.network");
                    delay
                }
            };

            retries += 1;
            sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        timeout: Duration,
        headers: Option<&HeaderMap>,
    ) -> Result<Attempt, reqwest::Error> {
        let mut request = self.inner.get(url.clone()).timeout(timeout);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(%status, elapsed_ms, len = body.len(), ?content_type, "http.response");
        log_raw(status, &body);

        if status.is_success() {
            Ok(Attempt::Done(Fetched {
                url: url.clone(),
                status,
                content_type,
                body,
            }))
        } else {
            Ok(Attempt::Failed {
                status,
                headers,
                body,
            })
        }
    }
}

/// Pause before retry number `retry`, or `None` when `status` is final.
fn retry_delay(status: StatusCode, headers: &HeaderMap, retry: usize) -> Option<Duration> {
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS;
    if !rate_limited && !status.is_server_error() {
        return None;
    }
    if let Some(secs) = retry_after_secs(headers) {
        return Some(Duration::from_secs(secs));
    }
    let delay = backoff(retry);
    Some(if rate_limited {
        delay.max(RATE_LIMIT_FLOOR)
    } else {
        delay
    })
}

fn backoff(retry: usize) -> Duration {
    let shift = retry.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << shift))
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("{TIMED_OUT}: {err}")
    } else {
        err.to_string()
    }
}

/// `message`, `detail` or `error` from a JSON error body, else a snippet.
fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| [b.message, b.detail, b.error].into_iter().find(|m| !m.is_empty()))
        .unwrap_or_else(|| snippet(body))
}

fn log_raw(status: StatusCode, body: &[u8]) {
    let enabled = matches!(env::var(RAW_ENV).as_deref(), Ok("1" | "true" | "yes"));
    if enabled {
        let truncated = body.len() > RAW_MAX_BODY;
        let text = String::from_utf8_lossy(&body[..body.len().min(RAW_MAX_BODY)]);
        info!(target: "http.raw", %status, body = %text, truncated);
    } else {
        trace!(snippet = %snippet(body), "http.response.body");
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > SNIPPET_MAX {
        let mut snip: String = text.chars().take(SNIPPET_MAX).collect();
        snip.push_str("...");
        snip
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn only_rate_limits_and_server_errors_retry() {
        let none = HeaderMap::new();
        assert_eq!(retry_delay(StatusCode::NOT_FOUND, &none, 1), None);
        assert_eq!(retry_delay(StatusCode::BAD_GATEWAY, &none, 2), Some(Duration::from_millis(400)));
        assert_eq!(retry_delay(StatusCode::TOO_MANY_REQUESTS, &none, 1), Some(RATE_LIMIT_FLOOR));
    }

    #[test]
    fn retry_after_wins_when_numeric() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(
            retry_delay(StatusCode::SERVICE_UNAVAILABLE, &headers, 1),
            Some(Duration::from_secs(3))
        );

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_secs(&headers), None);
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(error_message(br#"{"detail":"quota"}"#), "quota");
        assert_eq!(error_message(b"plain failure"), "plain failure");
    }

    #[test]
    fn snippet_is_char_safe() {
        let long = "é".repeat(SNIPPET_MAX + 10);
        let snip = snippet(long.as_bytes());
        assert!(snip.ends_with("..."));
        assert_eq!(snip.chars().count(), SNIPPET_MAX + 3);
    }
}
