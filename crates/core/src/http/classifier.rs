//! Response classification
//!
//! Maps a raw [`WireResponse`] to an [`Outcome`]:
//!
//! | Status          | Retry budget | Outcome                         |
//! |-----------------|--------------|---------------------------------|
//! | 2xx, 3xx        | any          | `Success`                       |
//! | 401             | > 0          | `RetryableAuthFailure`          |
//! | 401             | 0            | `Fatal(Unauthorized)`           |
//! | anything else   | any          | `Fatal(Http)`                   |
//!
//! A body that could not be read is always fatal. Error messages come from a
//! JSON error body when there is one, otherwise `HttpResponse code <status>`.

use graphlink_domain::{GraphError, Result};
use serde::Deserialize;
use serde_json::Value;

use super::ports::WireResponse;
use super::response::ApiResponse;

/// Result of classifying one response
#[derive(Debug)]
pub enum Outcome {
    Success(ApiResponse),
    /// 401 with retries remaining; the credential should be refreshed and the
    /// request resent.
    RetryableAuthFailure { message: String, code: Option<i64> },
    Fatal(GraphError),
}

/// Message and code extracted from an error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: String,
    pub code: Option<i64>,
}

// Accepts both `{"error": {"message", "code"}}` and a flat
// `{"message", "code"}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorPayload>,
    #[serde(flatten)]
    flat: ErrorPayload,
}

#[derive(Deserialize, Default)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

/// Classify a domain-endpoint response given the remaining retry budget
pub fn classify(response: WireResponse, retries_left: u32) -> Outcome {
    let is_json = response.is_json();
    let WireResponse { status, headers, body } = response;

    let body = match body {
        Ok(body) => body,
        Err(source) => return Outcome::Fatal(GraphError::Transport { status: Some(status), source }),
    };

    if (200..400).contains(&status) {
        return Outcome::Success(ApiResponse::new(status, headers, body));
    }

    let details = error_details(status, is_json, &body);
    if status == 401 {
        if retries_left > 0 {
            return Outcome::RetryableAuthFailure { message: details.message, code: details.code };
        }
        return Outcome::Fatal(GraphError::Unauthorized {
            message: details.message,
            code: details.code,
        });
    }

    Outcome::Fatal(GraphError::Http {
        status,
        message: details.message,
        code: details.code,
        body: body_snippet(&body),
    })
}

/// Classify a credential-endpoint (`app`, `refresh`, `revoke`) response
///
/// # Errors
/// - `GraphError::Unauthorized` for a 401
/// - `GraphError::AuthenticationFailure` for any other non-success status
/// - `GraphError::Transport` if the body could not be read
pub fn classify_credential(response: WireResponse) -> Result<ApiResponse> {
    let is_json = response.is_json();
    let WireResponse { status, headers, body } = response;
    let body = body.map_err(|source| GraphError::Transport { status: Some(status), source })?;

    if (200..400).contains(&status) {
        return Ok(ApiResponse::new(status, headers, body));
    }

    let ErrorDetails { message, code } = error_details(status, is_json, &body);
    if status == 401 {
        Err(GraphError::Unauthorized { message, code })
    } else {
        Err(GraphError::AuthenticationFailure { status: Some(status), message, code })
    }
}

/// Extract a human-readable message and backend code from an error body
pub fn error_details(status: u16, is_json: bool, body: &[u8]) -> ErrorDetails {
    let parsed = is_json
        .then(|| serde_json::from_slice::<ErrorEnvelope>(body).ok())
        .flatten()
        .map(|envelope| envelope.error.unwrap_or(envelope.flat))
        .unwrap_or_default();

    let message = parsed
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback_message(status));

    ErrorDetails { message, code: parsed.code.as_ref().and_then(code_as_i64) }
}

/// `HttpResponse code <status>`
pub fn fallback_message(status: u16) -> String {
    format!("HttpResponse code {status}")
}

fn code_as_i64(code: &Value) -> Option<i64> {
    match code {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn body_snippet(body: &[u8]) -> Option<String> {
    const MAX_SNIPPET: usize = 512;

    if body.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(body);
    Some(text.chars().take(MAX_SNIPPET).collect())
}
