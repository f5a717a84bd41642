//! Bearer credential and its expiry arithmetic
//!
//! A [`Credential`] starts blank. Once acquired it always carries an
//! `expires_at` and `last_update`; the refresh threshold is
//! `expires_at - refresh_offset` and the credential counts as expired once
//! the clock passes it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::wire::TokenResponse;
use crate::errors::{GraphError, Result};

/// Current bearer token with refresh and expiry metadata
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Opaque bearer token, blank before first acquisition
    pub token: String,

    /// Absolute expiry supplied by the backend
    pub expires_at: Option<DateTime<Utc>>,

    /// Absent means the next renewal must go through primary acquisition
    pub refresh_token: Option<String>,

    /// Instant of the last successful acquire/refresh
    pub last_update: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential from a token endpoint response received at `now`
    ///
    /// # Errors
    /// Returns `GraphError::AuthenticationFailure` when the response carries a
    /// blank token or no expiry.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| GraphError::AuthenticationFailure {
                status: None,
                message: "Credential endpoint returned an empty token".into(),
                code: None,
            })?;

        let expires_at = response.expires_at.ok_or_else(|| GraphError::AuthenticationFailure {
            status: None,
            message: "Credential endpoint returned no expires_at".into(),
            code: None,
        })?;

        Ok(Self {
            token,
            expires_at: Some(expires_at),
            refresh_token: response.refresh_token.filter(|token| !token.trim().is_empty()),
            last_update: Some(now),
        })
    }

    /// True before the first acquisition and after a revoke
    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// `expires_at - refresh_offset`, or `None` while blank
    pub fn refresh_threshold(&self, refresh_offset: Duration) -> Option<DateTime<Utc>> {
        self.expires_at.map(|expires_at| shift_back(expires_at, refresh_offset))
    }

    /// `now > expires_at - refresh_offset`; a blank credential is always
    /// expired.
    pub fn is_expired(&self, now: DateTime<Utc>, refresh_offset: Duration) -> bool {
        match self.refresh_threshold(refresh_offset) {
            Some(threshold) if !self.is_blank() => now > threshold,
            _ => true,
        }
    }

    /// `now < last_update + fresh_buffer`
    pub fn is_fresh(&self, now: DateTime<Utc>, fresh_buffer: Duration) -> bool {
        self.last_update.is_some_and(|last| now < shift_forward(last, fresh_buffer))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.is_blank() { "<blank>" } else { "<redacted>" };
        f.debug_struct("Credential")
            .field("token", &token)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("last_update", &self.last_update)
            .finish()
    }
}

fn shift_back(instant: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| instant.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn shift_forward(instant: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
    }

    fn issued(expires_at: i64, last_update: i64) -> Credential {
        Credential {
            token: "tok".into(),
            expires_at: Some(at(expires_at)),
            refresh_token: Some("ref".into()),
            last_update: Some(at(last_update)),
        }
    }

    #[test]
    fn blank_credential_is_expired_and_not_fresh() {
        let credential = Credential::default();
        assert!(credential.is_blank());
        assert!(credential.is_expired(at(0), Duration::ZERO));
        assert!(!credential.is_fresh(at(0), Duration::from_secs(60)));
        assert_eq!(credential.refresh_threshold(Duration::ZERO), None);
    }

    #[test]
    fn expiry_boundary_sits_at_threshold() {
        let t = 1_700_000_000_000;
        let offset = Duration::from_millis(5000);
        let credential = issued(t, t - 60_000);

        assert!(!credential.is_expired(at(t - 5001), offset));
        assert!(!credential.is_expired(at(t - 5000), offset));
        assert!(credential.is_expired(at(t - 4999), offset));
        assert_eq!(credential.refresh_threshold(offset), Some(at(t - 5000)));
    }

    #[test]
    fn freshness_window_is_half_open() {
        let credential = issued(10_000_000, 1_000_000);
        let buffer = Duration::from_millis(500);

        assert!(credential.is_fresh(at(1_000_000), buffer));
        assert!(credential.is_fresh(at(1_000_499), buffer));
        assert!(!credential.is_fresh(at(1_000_500), buffer));
        assert!(!credential.is_fresh(at(1_000_000), Duration::ZERO));
    }

    #[test]
    fn huge_offsets_saturate_instead_of_overflowing() {
        let credential = issued(1_000, 0);
        assert!(credential.is_expired(at(0), Duration::MAX));
        assert!(credential.is_fresh(at(5_000_000), Duration::MAX));
    }

    #[test]
    fn from_response_rejects_blank_token() {
        let response =
            TokenResponse { token: Some("  ".into()), expires_at: Some(at(1)), refresh_token: None };
        let err = Credential::from_response(response, at(0)).unwrap_err();
        assert!(matches!(err, GraphError::AuthenticationFailure { .. }));
    }

    #[test]
    fn from_response_records_update_instant() {
        let response = TokenResponse {
            token: Some("abc".into()),
            expires_at: Some(at(90_000)),
            refresh_token: Some(String::new()),
        };
        let credential = Credential::from_response(response, at(1_000)).unwrap();

        assert_eq!(credential.token, "abc");
        assert_eq!(credential.last_update, Some(at(1_000)));
        assert!(!credential.has_refresh_token());
    }

    #[test]
    fn debug_never_prints_tokens() {
        let rendered = format!("{:?}", issued(1, 0));
        assert!(!rendered.contains("tok\""));
        assert!(!rendered.contains("ref\""));
        assert!(rendered.contains("<redacted>"));
    }
}
