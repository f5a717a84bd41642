//! Error types used throughout graphlink

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of I/O-level failure reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// The per-attempt timeout elapsed
    Timeout,
    /// Connection could not be established
    Connect,
    /// The request could not be built or sent
    Request,
    /// The response body could not be read
    Body,
    /// The transport cannot carry this kind of request
    Unsupported,
    /// Anything else
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Unsupported => "unsupported",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// I/O failure raised by a transport (connection reset, timeout, body read)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

/// Categories of graphlink errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials invalid, rejected, or in need of a refresh
    Authentication,
    /// Non-success response from a domain endpoint
    Http,
    /// Connection, timeout or body-read failure
    Transport,
    /// The caller built a request the pipeline cannot send or decode
    Client,
    /// Invalid configuration
    Config,
    /// Caller cancelled the call
    Cancelled,
}

/// Main error type for graphlink
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum GraphError {
    /// 401 with the retry budget exhausted, or a credential endpoint rejected
    /// the credentials outright.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, code: Option<i64> },

    /// Any non-401 failure returned by a credential endpoint.
    #[error("Authentication failed: {message}")]
    AuthenticationFailure { status: Option<u16>, message: String, code: Option<i64> },

    /// Non-2xx/3xx response from a domain endpoint.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String, code: Option<i64>, body: Option<String> },

    /// I/O-level failure. `status` is set when the failure happened while
    /// reading the body of a response that had already arrived.
    #[error("Transport failure: {source}")]
    Transport { status: Option<u16>, source: TransportError },

    /// Async-only control signal: the credential was rejected and the caller
    /// must refresh it and resend the request.
    #[error("Credential rejected (HTTP {status}); refresh and resend the request")]
    RetryNeeded { status: u16 },

    /// A successful response carried a body that could not be decoded.
    #[error("Failed to decode response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GraphError {
    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. }
            | Self::AuthenticationFailure { .. }
            | Self::RetryNeeded { .. } => ErrorCategory::Authentication,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Decode { .. } | Self::InvalidRequest(_) => ErrorCategory::Client,
            Self::Config(_) => ErrorCategory::Config,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// HTTP status associated with the failure, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::AuthenticationFailure { status, .. } | Self::Transport { status, .. } => *status,
            Self::Http { status, .. } | Self::RetryNeeded { status } | Self::Decode { status, .. } => {
                Some(*status)
            }
            Self::InvalidRequest(_) | Self::Config(_) | Self::Cancelled => None,
        }
    }

    /// Backend-supplied error code, when the error body carried one
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Unauthorized { code, .. }
            | Self::AuthenticationFailure { code, .. }
            | Self::Http { code, .. } => *code,
            _ => None,
        }
    }

    /// True for the async retry-needed signal
    pub fn is_retry_needed(&self) -> bool {
        matches!(self, Self::RetryNeeded { .. })
    }

    /// True when the credentials themselves were rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Stable label suitable for structured logging
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::Http { .. } => "http",
            Self::Transport { .. } => "transport",
            Self::RetryNeeded { .. } => "retry_needed",
            Self::Decode { .. } => "decode",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<TransportError> for GraphError {
    fn from(source: TransportError) -> Self {
        Self::Transport { status: None, source }
    }
}

/// Result type alias for graphlink operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            GraphError::Unauthorized { message: "x".into(), code: None }.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(GraphError::RetryNeeded { status: 401 }.category(), ErrorCategory::Authentication);
        assert_eq!(
            GraphError::Http { status: 500, message: "x".into(), code: None, body: None }
                .category(),
            ErrorCategory::Http
        );
        assert_eq!(
            GraphError::from(TransportError::timeout("slow")).category(),
            ErrorCategory::Transport
        );
        assert_eq!(GraphError::Config("x".into()).category(), ErrorCategory::Config);
    }

    #[test]
    fn status_is_reported_where_known() {
        assert_eq!(GraphError::Unauthorized { message: "x".into(), code: None }.status(), Some(401));
        assert_eq!(
            GraphError::Transport { status: Some(200), source: TransportError::body("reset") }
                .status(),
            Some(200)
        );
        assert_eq!(GraphError::from(TransportError::timeout("slow")).status(), None);
        assert_eq!(GraphError::Cancelled.status(), None);
    }

    #[test]
    fn serializes_with_type_tag() {
        let err = GraphError::Http {
            status: 503,
            message: "HttpResponse code 503".into(),
            code: None,
            body: Some("<html>".into()),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Http");
        assert_eq!(json["detail"]["status"], 503);

        let back: GraphError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn display_includes_transport_kind() {
        let err = GraphError::from(TransportError::timeout("deadline elapsed"));
        assert_eq!(err.to_string(), "Transport failure: timeout error: deadline elapsed");
    }
}
