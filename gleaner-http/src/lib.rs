//! Minimal HTTP client with safe logging and opt-in retries.
//!
//! - Request options: headers, timeout, retries
//! - Text (`get_text`) and JSON (`post_json`) helpers over absolute URLs
//! - Retries network failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support, but only when a retry budget is configured
//! - Optional body snippet logging via `GLEANER_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), gleaner_http::HttpError> {
//! let client = gleaner_http::HttpClient::new()?;
//! let page = client
//!     .get_text("https://example.com", gleaner_http::RequestOpts::default())
//!     .await?;
//! assert!(page.status.is_success());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events (target `http.request`) are
//! emitted for request start, response status, retries and final errors.

use encoding_rs::{Encoding, UTF_8};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method};

pub use reqwest::StatusCode;
pub use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

const RAW_ENV: &str = "GLEANER_HTTP_RAW";
const SNIPPET_LEN: usize = 500;
/// Upper bound on a single retry delay, including server-sent `Retry-After`.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl HttpError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network(_) | HttpError::Timeout(_) => true,
            HttpError::Status { status, .. } => is_retryable_status(*status),
            HttpError::Url(_) | HttpError::Build(_) | HttpError::Decode(..) => false,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// ==============================
// Request options
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use gleaner_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
}

/// A decoded text body together with response metadata.
#[derive(Clone, Debug)]
pub struct TextResponse {
    /// URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
    pub retry_base: Duration,
}

impl HttpClient {
    /// Construct a client with the default user agent.
    ///
    /// ```no_run
    /// use gleaner_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        Self::with_user_agent(concat!("gleaner/", env!("CARGO_PKG_VERSION")))
    }

    /// Construct a client that sends `user_agent` on every request.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_base: Duration::from_millis(200),
        })
    }

    /// Override the default timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget (zero disables retries).
    ///
    /// ```no_run
    /// use gleaner_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new()?.with_retries(3);
    /// assert_eq!(client.max_retries, 3);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Override the base delay of the exponential backoff.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// GET `url` and return its body as text.
    ///
    /// The body is decoded with the `Content-Type` charset, falling back to a
    /// byte-order mark and then UTF-8. Non-2xx responses become
    /// [`HttpError::Status`].
    pub async fn get_text(&self, url: &str, opts: RequestOpts) -> Result<TextResponse, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        let raw = self.send::<()>(Method::GET, &url, None, &opts).await?;
        let body = decode_text(&raw.bytes, raw.content_type.as_deref());
        Ok(TextResponse {
            url: raw.final_url,
            status: raw.status,
            content_type: raw.content_type,
            body,
        })
    }

    /// POST a JSON body to `url` and decode a JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B, opts: RequestOpts) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        let raw = self.send(Method::POST, &url, Some(body), &opts).await?;
        decode_json(&raw.bytes)
    }

    /// GET `url` and decode a JSON response.
    pub async fn get_json<T>(&self, url: &str, opts: RequestOpts) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        let raw = self.send::<()>(Method::GET, &url, None, &opts).await?;
        decode_json(&raw.bytes)
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn send<B>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
        opts: &RequestOpts,
    ) -> Result<RawResponse, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(bytes) = &body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            tracing::debug!(
                target: "http.request",
                attempt = attempt + 1,
                max_retries,
                method = %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms = timeout.as_millis() as u64,
                has_body = body_bytes.is_some(),
                "http.request.start"
            );

            let t0 = Instant::now();
            let outcome = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    let final_url = resp.url().clone();
                    match resp.bytes().await {
                        Ok(bytes) => Ok((status, headers, final_url, bytes)),
                        Err(err) => Err(classify(err, timeout)),
                    }
                }
                Err(err) => Err(classify(err, timeout)),
            };

            let (status, headers, final_url, bytes) = match outcome {
                Ok(parts) => parts,
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        tracing::warn!(
                            target: "http.request",
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            error = %err,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(target: "http.request", attempt, error = %err, "http.network_error");
                    return Err(err);
                }
            };

            tracing::debug!(
                target: "http.request",
                %status,
                duration_ms = t0.elapsed().as_millis() as u64,
                body_len = bytes.len(),
                "http.response"
            );
            if raw_enabled() {
                tracing::debug!(target: "http.raw", body = %snip_body(&bytes), "response body");
            }

            if status.is_success() {
                let content_type = headers
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                return Ok(RawResponse {
                    status,
                    final_url,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }

            if is_retryable_status(status) && attempt < max_retries {
                attempt += 1;
                let delay = self.retry_delay(&headers, attempt);
                tracing::warn!(
                    target: "http.request",
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    "http.retrying.status"
                );
                sleep(delay).await;
                continue;
            }

            let message = extract_error_message(&bytes);
            tracing::warn!(target: "http.request", %status, %message, "http.error");
            return Err(HttpError::Status { status, message });
        }
    }

    fn retry_delay(&self, headers: &HeaderMap, attempt: usize) -> Duration {
        retry_after(headers)
            .map(|d| d.min(MAX_BACKOFF))
            .unwrap_or_else(|| self.backoff(attempt))
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1) as u32).unwrap_or(u32::MAX);
        self.retry_base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

struct RawResponse {
    status: StatusCode,
    final_url: Url,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

// ==============================
// Helpers
// ==============================

fn classify(err: reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(timeout)
    } else if err.is_builder() {
        HttpError::Build(err.to_string())
    } else {
        HttpError::Network(err.to_string())
    }
}

fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(
            target: "http.request",
            encoding = used.name(),
            "http.response.replaced_invalid_bytes"
        );
    }
    text.into_owned()
}

/// `charset` parameter of a `Content-Type` value, unquoted.
fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            target: "http.request",
            serde_err = %e,
            body_snippet = %snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// Pull a human-readable message out of common JSON error envelopes.
fn extract_error_message(body: &[u8]) -> String {
    if let Ok(val) = serde_json::from_slice::<serde_json::Value>(body) {
        let candidates = [
            val.pointer("/error/message"),
            val.get("error"),
            val.get("message"),
            val.get("detail"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(s) = candidate.as_str().filter(|s| !s.is_empty()) {
                return s.to_string();
            }
        }
    }
    snip_body(body)
}

fn retry_after(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= SNIPPET_LEN {
        return text.into_owned();
    }
    let mut snip: String = text.chars().take(SNIPPET_LEN).collect();
    snip.push_str("...");
    snip
}
