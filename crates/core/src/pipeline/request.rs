//! Logical request issued by callers

use std::time::Duration;

use graphlink_domain::{GraphError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use crate::http::RequestBody;

/// One logical call: method, path relative to the API root, caller headers,
/// body, and optional per-call overrides
///
/// ```
/// use graphlink_core::pipeline::ApiRequest;
///
/// let request = ApiRequest::get("nodes/42")
///     .header("X-Trace", "abc")
///     .max_retries(1);
/// assert_eq!(request.path(), "nodes/42");
/// ```
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: RequestBody,
    json_body: bool,
    raw: bool,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    invalid_header: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            json_body: false,
            raw: false,
            timeout: None,
            max_retries: None,
            invalid_header: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a caller header
    ///
    /// An invalid name or value is reported when the request is executed.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: std::fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: std::fmt::Display,
    {
        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                self.reject_header(format!("invalid header name: {e}"));
                return self;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => self.reject_header(format!("invalid value for header '{name}': {e}")),
        }
        self
    }

    // First error wins
    fn reject_header(&mut self, message: String) {
        if self.invalid_header.is_none() {
            self.invalid_header = Some(message);
        }
    }

    /// Serialize `value` as the JSON body
    ///
    /// # Errors
    /// Returns `GraphError::InvalidRequest` if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_string(value)
            .map_err(|e| GraphError::InvalidRequest(format!("Failed to encode JSON body: {e}")))?;
        self.body = RequestBody::Text(body);
        self.json_body = true;
        Ok(self)
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self.json_body = false;
        self
    }

    pub fn bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self.json_body = false;
        self
    }

    /// Streamed body; such a request can be sent once and is not retried
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self.json_body = false;
        self
    }

    /// Skip the automatic `Accept: application/json` header
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Per-attempt timeout for this call only
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry budget for this call only
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }

    pub fn is_json_body(&self) -> bool {
        self.json_body
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_retries_override(&self) -> Option<u32> {
        self.max_retries
    }

    /// Copy of this request for resubmission, or `None` if the body is a
    /// stream
    pub fn try_clone(&self) -> Option<Self> {
        Some(Self {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
            json_body: self.json_body,
            raw: self.raw,
            timeout: self.timeout,
            max_retries: self.max_retries,
            invalid_header: self.invalid_header.clone(),
        })
    }

    /// Fail on a header rejected while building
    pub(crate) fn validate(&self) -> Result<()> {
        match &self.invalid_header {
            Some(message) => Err(GraphError::InvalidRequest(message.clone())),
            None => Ok(()),
        }
    }

    /// Take the body out for a single dispatch
    pub(crate) fn take_body(&mut self) -> RequestBody {
        std::mem::take(&mut self.body)
    }
}
