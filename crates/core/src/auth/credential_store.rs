//! Credential store
//!
//! Owns the bearer credential shared by every call made through one handler.
//!
//! All check-and-act sequences (`get_token`, `refresh`, `acquire`, `revoke`)
//! run inside a single critical section guarded by one `tokio::sync::Mutex`,
//! so concurrent 401s collapse into at most one network exchange. The
//! blocking methods take the lock with `blocking_lock`, the async methods
//! with `lock().await`; both paths contend on the same lock.
//!
//! The credential itself sits behind a separate read lock so introspection
//! (`snapshot`, `expiry_instant`, `is_authenticated`) never waits on an
//! in-flight exchange. It is only ever written while the exchange lock is
//! held.
//!
//! The blocking methods must not be called from within an async runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use graphlink_common::time::{Clock, SystemClock};
use graphlink_domain::constants::{
    APP_TOKEN_ENDPOINT, JSON_CONTENT_TYPE, REFRESH_TOKEN_ENDPOINT, REVOKE_TOKEN_ENDPOINT,
};
use graphlink_domain::{
    AppGrant, ClientConfig, Credential, GraphError, RefreshGrant, Result, TokenResponse,
    TransportError,
};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::http::{classify_credential, RequestBody, Transport, WireRequest, WireResponse};

/// Network exchange needed to bring the credential up to date
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exchange {
    Acquire,
    Refresh { refresh_token: String },
}

impl Exchange {
    fn endpoint(&self) -> &'static str {
        match self {
            Self::Acquire => APP_TOKEN_ENDPOINT,
            Self::Refresh { .. } => REFRESH_TOKEN_ENDPOINT,
        }
    }

    /// Refresh when a refresh token exists, otherwise primary acquisition
    fn renewal(credential: &Credential) -> Self {
        match &credential.refresh_token {
            Some(refresh_token) => Self::Refresh { refresh_token: refresh_token.clone() },
            None => Self::Acquire,
        }
    }
}

/// Thread-safe owner of the bearer credential
pub struct CredentialStore {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    exchange_lock: Mutex<()>,
    current: RwLock<Credential>,
}

impl CredentialStore {
    /// Create an empty store; the first `get_token` performs acquisition
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Create an empty store reading time from `clock`
    pub fn with_clock(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
            exchange_lock: Mutex::new(()),
            current: RwLock::new(Credential::default()),
        }
    }

    // ---------------------------------------------------------------------
    // Blocking API
    // ---------------------------------------------------------------------

    /// Return a valid, non-blank token
    ///
    /// Acquires when no token exists and renews when the current one is past
    /// its refresh threshold.
    ///
    /// # Errors
    /// Propagates the failure of the acquisition or refresh exchange; the
    /// stored credential is left as it was.
    #[instrument(skip(self))]
    pub fn get_token(&self) -> Result<String> {
        let _guard = self.exchange_lock.blocking_lock();
        if let Some(exchange) = self.exchange_for_token() {
            self.exchange_blocking(exchange)?;
        }
        Ok(self.current.read().token.clone())
    }

    /// Renew the credential unless it was updated within `fresh_buffer`
    ///
    /// # Errors
    /// Propagates the failure of the exchange; the stored credential is left
    /// as it was.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<()> {
        let _guard = self.exchange_lock.blocking_lock();
        match self.exchange_for_refresh() {
            Some(exchange) => self.exchange_blocking(exchange),
            None => Ok(()),
        }
    }

    /// Exchange the primary credentials for a new credential, unconditionally
    ///
    /// # Errors
    /// `Unauthorized` if the backend rejects the credentials,
    /// `AuthenticationFailure` for any other failed exchange.
    #[instrument(skip(self))]
    pub fn acquire(&self) -> Result<()> {
        let _guard = self.exchange_lock.blocking_lock();
        self.exchange_blocking(Exchange::Acquire)
    }

    /// Invalidate the refresh token server-side and clear local state
    ///
    /// Local state is cleared whatever the backend answers. Without a refresh
    /// token no network call is made.
    ///
    /// # Errors
    /// Reports a failed revoke exchange after clearing local state.
    #[instrument(skip(self))]
    pub fn revoke(&self) -> Result<()> {
        let _guard = self.exchange_lock.blocking_lock();
        let Some(request) = self.revoke_request()? else {
            self.clear();
            return Ok(());
        };
        let response = self.transport.send(request);
        self.clear();
        Self::complete_revoke(response)
    }

    // ---------------------------------------------------------------------
    // Async API
    // ---------------------------------------------------------------------

    /// Async counterpart of [`get_token`](Self::get_token)
    ///
    /// # Errors
    /// See [`get_token`](Self::get_token).
    #[instrument(skip(self))]
    pub async fn get_token_async(&self) -> Result<String> {
        let _guard = self.exchange_lock.lock().await;
        if let Some(exchange) = self.exchange_for_token() {
            self.exchange_async(exchange).await?;
        }
        Ok(self.current.read().token.clone())
    }

    /// Async counterpart of [`refresh`](Self::refresh)
    ///
    /// # Errors
    /// See [`refresh`](Self::refresh).
    #[instrument(skip(self))]
    pub async fn refresh_async(&self) -> Result<()> {
        let _guard = self.exchange_lock.lock().await;
        match self.exchange_for_refresh() {
            Some(exchange) => self.exchange_async(exchange).await,
            None => Ok(()),
        }
    }

    /// Async counterpart of [`acquire`](Self::acquire)
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    #[instrument(skip(self))]
    pub async fn acquire_async(&self) -> Result<()> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange_async(Exchange::Acquire).await
    }

    /// Async counterpart of [`revoke`](Self::revoke)
    ///
    /// # Errors
    /// See [`revoke`](Self::revoke).
    #[instrument(skip(self))]
    pub async fn revoke_async(&self) -> Result<()> {
        let _guard = self.exchange_lock.lock().await;
        let Some(request) = self.revoke_request()? else {
            self.clear();
            return Ok(());
        };
        let response = self.transport.send_async(request).await;
        self.clear();
        Self::complete_revoke(response)
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Refresh threshold (`expires_at - refresh_offset`), for schedulers that
    /// renew ahead of time. `None` while no credential is held.
    pub fn expiry_instant(&self) -> Option<DateTime<Utc>> {
        self.current.read().refresh_threshold(self.config.refresh_offset)
    }

    /// Time left until the refresh threshold, zero once it has passed
    pub fn time_until_refresh(&self) -> Option<Duration> {
        let threshold = self.expiry_instant()?;
        Some((threshold - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn is_authenticated(&self) -> bool {
        !self.current.read().is_blank()
    }

    /// True when the next `get_token` would perform an exchange
    pub fn needs_renewal(&self) -> bool {
        self.current.read().is_expired(self.clock.now(), self.config.refresh_offset)
    }

    /// Copy of the current credential
    pub fn snapshot(&self) -> Credential {
        self.current.read().clone()
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn exchange_for_token(&self) -> Option<Exchange> {
        let credential = self.current.read();
        if credential.is_blank() {
            return Some(Exchange::Acquire);
        }
        credential
            .is_expired(self.clock.now(), self.config.refresh_offset)
            .then(|| Exchange::renewal(&credential))
    }

    fn exchange_for_refresh(&self) -> Option<Exchange> {
        let credential = self.current.read();
        if credential.is_blank() {
            return Some(Exchange::Acquire);
        }
        if credential.is_fresh(self.clock.now(), self.config.fresh_buffer) {
            debug!("Credential updated within fresh buffer, skipping refresh");
            return None;
        }
        Some(Exchange::renewal(&credential))
    }

    fn exchange_blocking(&self, exchange: Exchange) -> Result<()> {
        let request = self.grant_request(&exchange)?;
        let response = self.transport.send(request);
        self.complete(&exchange, response)
    }

    async fn exchange_async(&self, exchange: Exchange) -> Result<()> {
        let request = self.grant_request(&exchange)?;
        let response = self.transport.send_async(request).await;
        self.complete(&exchange, response)
    }

    fn grant_request(&self, exchange: &Exchange) -> Result<WireRequest> {
        let credentials = &self.config.credentials;
        match exchange {
            Exchange::Acquire => {
                self.credential_request(APP_TOKEN_ENDPOINT, &AppGrant::from(credentials))
            }
            Exchange::Refresh { refresh_token } => self.credential_request(
                REFRESH_TOKEN_ENDPOINT,
                &RefreshGrant::new(credentials, refresh_token),
            ),
        }
    }

    fn revoke_request(&self) -> Result<Option<WireRequest>> {
        let credential = self.current.read().clone();
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            debug!("No refresh token held, revoking locally only");
            return Ok(None);
        };
        let grant = RefreshGrant::new(&self.config.credentials, refresh_token);
        self.credential_request(REVOKE_TOKEN_ENDPOINT, &grant).map(Some)
    }

    /// JSON POST to a credential endpoint; never carries `Authorization`
    fn credential_request<T: Serialize>(&self, endpoint: &str, grant: &T) -> Result<WireRequest> {
        let body = serde_json::to_string(grant)
            .map_err(|e| GraphError::InvalidRequest(format!("Failed to encode {endpoint} grant: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| GraphError::Config(format!("Invalid user_agent: {e}")))?;
        headers.insert(USER_AGENT, user_agent);

        Ok(WireRequest {
            method: Method::POST,
            url: self.config.endpoint_url(endpoint),
            headers,
            body: RequestBody::Text(body),
            timeout: self.config.request_timeout,
        })
    }

    /// Classify an `app`/`refresh` response and, on success, replace the
    /// stored credential
    fn complete(
        &self,
        exchange: &Exchange,
        response: std::result::Result<WireResponse, TransportError>,
    ) -> Result<()> {
        let endpoint = exchange.endpoint();
        let outcome = response
            .map_err(GraphError::from)
            .and_then(classify_credential)
            .and_then(|response| {
                let payload = response.json::<TokenResponse>().map_err(|e| {
                    GraphError::AuthenticationFailure {
                        status: Some(response.status()),
                        message: format!("Malformed {endpoint} response: {e}"),
                        code: None,
                    }
                })?;
                Credential::from_response(payload.unwrap_or_default(), self.clock.now())
            });

        match outcome {
            Ok(credential) => {
                info!(
                    endpoint,
                    expires_at = ?credential.expires_at,
                    has_refresh_token = credential.has_refresh_token(),
                    "Credential updated"
                );
                *self.current.write() = credential;
                Ok(())
            }
            Err(err) => {
                warn!(endpoint, error = %err, kind = err.label(), "Credential exchange failed");
                Err(err)
            }
        }
    }

    fn complete_revoke(response: std::result::Result<WireResponse, TransportError>) -> Result<()> {
        let result = response.map_err(GraphError::from).and_then(classify_credential);
        match result {
            Ok(_) => {
                info!("Credential revoked");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Revoke call failed; local credential cleared anyway");
                Err(err)
            }
        }
    }

    fn clear(&self) {
        *self.current.write() = Credential::default();
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("api_url", &self.config.api_url)
            .field("credential", &*self.current.read())
            .finish_non_exhaustive()
    }
}
