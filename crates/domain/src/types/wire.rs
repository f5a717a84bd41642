//! Credential-endpoint wire contract
//!
//! | Endpoint  | Request body                                        |
//! |-----------|-----------------------------------------------------|
//! | `app`     | `{username, password, client_id, client_secret}`    |
//! | `refresh` | `{client_id, client_secret, refresh_token}`         |
//! | `revoke`  | `{client_id, client_secret, refresh_token}`         |
//!
//! `app` and `refresh` answer with [`TokenResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PrimaryCredentials;
use crate::utils::epoch_millis;

/// Body of the `app` (primary acquisition) call
#[derive(Debug, Serialize)]
pub struct AppGrant<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

impl<'a> From<&'a PrimaryCredentials> for AppGrant<'a> {
    fn from(credentials: &'a PrimaryCredentials) -> Self {
        Self {
            username: &credentials.username,
            password: &credentials.password,
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
        }
    }
}

/// Body of the `refresh` and `revoke` calls
#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
}

impl<'a> RefreshGrant<'a> {
    pub fn new(credentials: &'a PrimaryCredentials, refresh_token: &'a str) -> Self {
        Self {
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            refresh_token,
        }
    }
}

/// Token payload returned by `app` and `refresh`
///
/// Every field is optional on the wire so that an empty or partial body is
/// reported as an authentication failure rather than a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,

    /// Absolute expiry, epoch milliseconds
    #[serde(default, with = "epoch_millis")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub refresh_token: Option<String>,
}
