//! HTTP fetch client - the single egress point for every outbound request
//!
//! Responsibilities:
//! - per-request timeout
//! - transport-level retry with exponential backoff and jitter
//! - per-source politeness throttle (one token per send)
//! - classification of every failure as [`Error::Transient`] or [`Error::Permanent`]
//!
//! Source adapters never retry; they call this client and translate its output.

use crate::config::{HttpConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{Sleeper, TokioSleeper, retry_with_sleeper};
use crate::throttle::SourceThrottle;
use crate::types::{FetchedBody, SourceId};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, REFERER};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces headers that must be regenerated for every attempt
pub type HeaderSigner = Arc<dyn Fn() -> Vec<(String, String)> + Send + Sync>;

/// Extra parameters for one request
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Query string pairs
    pub query: Vec<(String, String)>,
    /// Additional headers
    pub headers: Vec<(String, String)>,
    /// Referer header
    pub referer: Option<String>,
    /// Called before each attempt, including transport retries
    pub signer: Option<HeaderSigner>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("referer", &self.referer)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl RequestOptions {
    /// Options carrying only a referer
    pub fn with_referer(referer: Option<&str>) -> Self {
        Self {
            referer: referer.map(str::to_string),
            ..Self::default()
        }
    }

    /// Add a query pair
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a header
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Sign every attempt with headers from `signer`
    pub fn signed(mut self, signer: impl Fn() -> Vec<(String, String)> + Send + Sync + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }
}

/// Counters shared by all clones of a [`FetchClient`]
#[derive(Debug, Default)]
pub struct FetchStats {
    requests_sent: AtomicU64,
    transient_failures: AtomicU64,
    permanent_failures: AtomicU64,
}

impl FetchStats {
    /// Requests put on the wire (every attempt counts)
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// Attempts that failed transiently
    pub fn transient_failures(&self) -> u64 {
        self.transient_failures.load(Ordering::Relaxed)
    }

    /// Attempts that failed permanently
    pub fn permanent_failures(&self) -> u64 {
        self.permanent_failures.load(Ordering::Relaxed)
    }
}

/// Fetch client (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    retry: RetryConfig,
    throttle: SourceThrottle,
    sleeper: Arc<dyn Sleeper>,
    stats: Arc<FetchStats>,
}

impl FetchClient {
    /// Create a fetch client from HTTP settings and a per-source throttle
    pub fn new(config: &HttpConfig, throttle: SourceThrottle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
            throttle,
            sleeper: Arc::new(TokioSleeper),
            stats: Arc::new(FetchStats::default()),
        })
    }

    /// Replace the sleeper used between transport retries
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Shared request counters
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Per-source throttle
    pub fn throttle(&self) -> &SourceThrottle {
        &self.throttle
    }

    /// GET a resource and return its body as text
    pub async fn get_text(&self, source: &SourceId, url: &str, options: &RequestOptions) -> Result<String> {
        let body = self.get_bytes(source, url, options).await?;
        String::from_utf8(body.bytes)
            .map_err(|e| Error::permanent(url, None, format!("response is not UTF-8: {}", e)))
    }

    /// GET a resource and deserialize its JSON body
    ///
    /// A body that does not deserialize is a malformed response, hence permanent.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source: &SourceId,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let body = self.get_bytes(source, url, options).await?;
        serde_json::from_slice(&body.bytes)
            .map_err(|e| Error::permanent(url, None, format!("malformed JSON: {}", e)))
    }

    /// GET a resource, retrying transient failures per the retry policy
    ///
    /// Signed headers are produced afresh for each attempt.
    pub async fn get_bytes(
        &self,
        source: &SourceId,
        url: &str,
        options: &RequestOptions,
    ) -> Result<FetchedBody> {
        let headers = &build_headers(url, options)?;
        retry_with_sleeper(&self.retry, self.sleeper.as_ref(), || async move {
            let mut headers = headers.clone();
            if let Some(signer) = &options.signer {
                insert_headers(&mut headers, url, &signer())?;
            }
            self.attempt(source, url, &options.query, headers).await
        })
        .await
    }

    /// One request attempt: take a throttle token, send, classify, read the body
    async fn attempt(
        &self,
        source: &SourceId,
        url: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<FetchedBody> {
        self.throttle.acquire(source).await;
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(source = %source, url = url, "GET");

        let result = self.send(url, query, headers).await;
        match &result {
            Err(Error::Transient { .. }) => {
                self.stats.transient_failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.permanent_failures.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
        }
        result
    }

    async fn send(&self, url: &str, query: &[(String, String)], headers: HeaderMap) -> Result<FetchedBody> {
        let mut request = self.client.get(url).headers(headers);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| classify_transport(url, &e))?;

        let status = response.status();
        if let Some(err) = classify_status(url, status) {
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let expected_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let final_url = response.url().to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transient(url, format!("failed to read body: {}", e)))?;

        if let Some(expected) = expected_len
            && expected != bytes.len() as u64
        {
            return Err(Error::transient(
                url,
                format!("truncated body: expected {} bytes, got {}", expected, bytes.len()),
            ));
        }

        Ok(FetchedBody {
            bytes: bytes.to_vec(),
            content_type,
            final_url,
        })
    }
}

fn build_headers(url: &str, options: &RequestOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(referer) = &options.referer {
        let value = HeaderValue::from_str(referer)
            .map_err(|e| Error::permanent(url, None, format!("invalid referer: {}", e)))?;
        headers.insert(REFERER, value);
    }
    insert_headers(&mut headers, url, &options.headers)?;
    Ok(headers)
}

fn insert_headers(headers: &mut HeaderMap, url: &str, pairs: &[(String, String)]) -> Result<()> {
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::permanent(url, None, format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::permanent(url, None, format!("invalid header value: {}", e)))?;
        headers.insert(name, value);
    }
    Ok(())
}

/// Map a non-success HTTP status to an error (None for 2xx/3xx)
pub(crate) fn classify_status(url: &str, status: StatusCode) -> Option<Error> {
    if status.is_success() || status.is_redirection() {
        return None;
    }
    let reason = format!("HTTP {}", status.as_u16());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
        Some(Error::transient(url, reason))
    } else {
        Some(Error::permanent(url, Some(status.as_u16()), reason))
    }
}

/// Map a transport error: timeouts and connection failures are transient,
/// builder and redirect-policy errors are permanent
fn classify_transport(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Error::transient(url, err.to_string())
    } else {
        Error::permanent(url, err.status().map(|s| s.as_u16()), err.to_string())
    }
}
