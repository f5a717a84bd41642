//! Conversions from reqwest errors into transport errors.

use graphlink_domain::{TransportError, TransportErrorKind};
use reqwest::Error as HttpError;

/// Extension trait that keeps the classification of third-party errors on
/// the infrastructure side.
pub trait IntoTransportError {
    fn into_transport(self) -> TransportError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl IntoTransportError for HttpError {
    fn into_transport(self) -> TransportError {
        if self.is_timeout() {
            return TransportError::timeout(format!("HTTP request timed out: {self}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return TransportError::new(
                TransportErrorKind::Connect,
                format!("HTTP connection failure: {self}"),
            );
        }

        let kind = if self.is_body() || self.is_decode() {
            TransportErrorKind::Body
        } else if self.is_builder() || self.is_request() || self.is_redirect() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, self.to_string())
    }
}

/// Failure while reading a response body that has already started arriving
///
/// Timeouts keep their kind; anything else is reported as a body error.
pub fn body_error(err: HttpError) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(format!("Timed out reading response body: {err}"))
    } else {
        TransportError::body(format!("Failed to read response body: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
