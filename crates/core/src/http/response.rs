//! Successful response handed back to callers

use graphlink_domain::{GraphError, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

/// A 2xx/3xx response with its body fully read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// True for an empty or whitespace-only body
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Body as UTF-8 text
    ///
    /// # Errors
    /// Returns `GraphError::Decode` if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone()).map_err(|e| GraphError::Decode {
            status: self.status,
            message: format!("Response body is not valid UTF-8: {e}"),
        })
    }

    /// Decode the body as JSON; a blank body yields `None`
    ///
    /// # Errors
    /// Returns `GraphError::Decode` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if self.is_blank() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some).map_err(|e| GraphError::Decode {
            status: self.status,
            message: format!("Invalid JSON response: {e}"),
        })
    }
}
