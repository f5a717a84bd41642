//! Port interface for the network transport
//!
//! Every exchange with the backend, including the credential endpoints,
//! goes through [`Transport`]. The pipeline and credential store depend only
//! on this trait; the reqwest adapter lives in `graphlink-infra`.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use graphlink_domain::TransportError;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;

/// Streamed request payload
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync>>;

/// Request payload handed to a transport
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    /// Consumed on send, so requests carrying it cannot be resent
    Stream(ByteStream),
}

impl RequestBody {
    /// Wrap a stream of chunks
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Copy the payload, or `None` for a stream
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Empty),
            Self::Text(text) => Some(Self::Text(text.clone())),
            Self::Bytes(bytes) => Some(Self::Bytes(bytes.clone())),
            Self::Stream(_) => None,
        }
    }

    /// Buffered payload bytes, or `None` for a stream
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Empty => Some(&[]),
            Self::Text(text) => Some(text.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            Self::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Fully prepared request: absolute URL, final headers, per-attempt timeout
#[derive(Debug)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// Response as received from the wire
///
/// `body` is an error when the status line arrived but the payload could not
/// be read.
#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Result<Vec<u8>, TransportError>,
}

impl WireResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body: Ok(body) }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    /// True when the `Content-Type` names a JSON media type
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

/// Network transport
///
/// Implementations perform exactly one exchange per call. Retries,
/// authentication and status classification belong to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Blocking exchange
    ///
    /// Must not be called from within an async runtime.
    fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;

    /// Non-blocking exchange
    async fn send_async(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}
