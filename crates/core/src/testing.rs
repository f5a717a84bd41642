//! In-memory transport for tests
//!
//! [`ScriptedTransport`] records every request it receives and answers with
//! whatever its responder closure returns, so tests can assert exact call
//! counts per endpoint without a network.
//!
//! Available in this crate's unit tests and to downstream crates through the
//! `test-utils` feature.

use std::time::Duration;

use async_trait::async_trait;
use graphlink_domain::constants::{
    default_user_agent, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FRESH_BUFFER, DEFAULT_MAX_RETRIES,
    DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_REFRESH_OFFSET, DEFAULT_REQUEST_TIMEOUT,
    JSON_CONTENT_TYPE,
};
use graphlink_domain::{ClientConfig, PrimaryCredentials, TransportError};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::http::{Transport, WireRequest, WireResponse};

/// Snapshot of a request seen by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// `None` for streamed bodies, which are not buffered
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Header names in insertion order
    pub fn header_names(&self) -> Vec<String> {
        self.headers.keys().map(|name| name.as_str().to_string()).collect()
    }

    pub fn json(&self) -> Option<Value> {
        self.body.as_deref().and_then(|body| serde_json::from_slice(body).ok())
    }

    /// URL path without the query string, `None` when the URL does not parse
    pub fn path(&self) -> Option<String> {
        Url::parse(&self.url).map(|url| url.path().to_owned()).ok()
    }

    /// True when the last path segment is `endpoint`
    pub fn targets(&self, endpoint: &str) -> bool {
        self.path()
            .is_some_and(|path| path.trim_end_matches('/').rsplit('/').next() == Some(endpoint))
    }
}

type Responder = dyn Fn(&RecordedRequest) -> Result<WireResponse, TransportError> + Send + Sync;

/// Transport that answers from a closure and records what it was sent
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<WireResponse, TransportError> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), requests: Mutex::new(Vec::new()), latency: Duration::ZERO }
    }

    /// Delay every answer, widening race windows in concurrency tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose last path segment is `endpoint`
    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.requests.lock().iter().filter(|request| request.targets(endpoint)).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn record(&self, request: &WireRequest) -> RecordedRequest {
        let recorded = RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.as_bytes().map(<[u8]>::to_vec),
            timeout: request.timeout,
        };
        self.requests.lock().push(recorded.clone());
        recorded
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let recorded = self.record(&request);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        (self.responder)(&recorded)
    }

    async fn send_async(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let recorded = self.record(&request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(&recorded)
    }
}

/// Response with a JSON body
pub fn json_response(status: u16, body: &Value) -> WireResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    WireResponse::new(status, headers, body.to_string().into_bytes())
}

/// Response with an arbitrary body and optional content type
pub fn text_response(status: u16, content_type: Option<&'static str>, body: &str) -> WireResponse {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    WireResponse::new(status, headers, body.as_bytes().to_vec())
}

/// `app`/`refresh` success payload
pub fn token_response(token: &str, expires_at_ms: i64, refresh_token: Option<&str>) -> WireResponse {
    json_response(
        200,
        &serde_json::json!({
            "token": token,
            "expires_at": expires_at_ms,
            "refresh_token": refresh_token,
        }),
    )
}

/// Configuration pointing at `https://graph.test/v1` with test credentials
pub fn test_config() -> ClientConfig {
    ClientConfig {
        api_url: "https://graph.test/v1".into(),
        credentials: PrimaryCredentials::new("user", "pass", "client", "secret"),
        user_agent: default_user_agent(),
        max_retries: DEFAULT_MAX_RETRIES,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
        connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        refresh_offset: DEFAULT_REFRESH_OFFSET,
        fresh_buffer: DEFAULT_FRESH_BUFFER,
        pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
    }
}
