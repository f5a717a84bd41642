//! Request pipeline
//!
//! Turns an [`ApiRequest`] into a [`WireRequest`], injects the bearer
//! credential, dispatches it and classifies the outcome.
//!
//! - The blocking path loops: each retryable 401 refreshes the credential and
//!   resends the identical request until the retry budget is spent.
//! - The async path performs exactly one dispatch. A retryable 401 surfaces as
//!   `GraphError::RetryNeeded`; the caller owns the body and decides whether
//!   to refresh and resubmit.

use std::sync::Arc;

use graphlink_domain::constants::{BEARER_PREFIX, JSON_CONTENT_TYPE};
use graphlink_domain::{ClientConfig, GraphError, Result};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::request::ApiRequest;
use crate::auth::CredentialStore;
use crate::http::{classify, ApiResponse, Outcome, RequestBody, Transport, WireRequest};

/// Authenticated request pipeline for one handler
pub struct RequestPipeline {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
}

impl RequestPipeline {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self { config, transport, credentials }
    }

    /// Build a pipeline with its own credential store over `transport`
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let credentials = Arc::new(CredentialStore::new(config.clone(), Arc::clone(&transport)));
        Self::new(config, transport, credentials)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Execute a request, refreshing the credential and resending on 401
    /// until the retry budget is spent
    ///
    /// Blocks the calling thread; must not be called from within an async
    /// runtime.
    ///
    /// # Errors
    /// - `GraphError::Unauthorized` once the budget is exhausted
    /// - `GraphError::Http` for any other non-success status
    /// - `GraphError::Transport` for I/O failures and timeouts
    /// - `GraphError::InvalidRequest` for streamed bodies or bad headers
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path(), request_id = %Uuid::new_v4())
    )]
    pub fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        request.validate()?;
        if request.request_body().is_stream() {
            return Err(GraphError::InvalidRequest(
                "streamed bodies are only supported by the async pipeline".into(),
            ));
        }

        let url = self.config.request_url(request.path())?;
        let mut retries_left = self.retry_budget(request);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let token = self.credentials.get_token()?;
            let body = request.request_body().try_clone().unwrap_or_default();
            let wire = self.prepare(request, url.clone(), body, &token)?;

            debug!(attempt, retries_left, "Dispatching request");
            let response = self.transport.send(wire)?;

            match classify(response, retries_left) {
                Outcome::Success(response) => {
                    debug!(attempt, status = response.status(), "Request succeeded");
                    return Ok(response);
                }
                Outcome::RetryableAuthFailure { message, .. } => {
                    warn!(attempt, retries_left, %message, "Credential rejected, refreshing before retry");
                    self.credentials.refresh()?;
                    retries_left -= 1;
                }
                Outcome::Fatal(err) => return Err(Self::log_failure(attempt, err)),
            }
        }
    }

    /// [`execute`](Self::execute) and decode the body as JSON
    ///
    /// # Errors
    /// See [`execute`](Self::execute); also `GraphError::Decode`.
    pub fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<Option<T>> {
        self.execute(request)?.json()
    }

    /// Perform a single dispatch-and-classify step
    ///
    /// # Errors
    /// - `GraphError::RetryNeeded` on a 401 while the request still has retry
    ///   budget; refresh the credential and resubmit
    /// - `GraphError::Unauthorized` on a 401 with a budget of zero
    /// - otherwise as [`execute`](Self::execute)
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path(), request_id = %Uuid::new_v4())
    )]
    pub async fn execute_async(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        request.validate()?;
        let url = self.config.request_url(request.path())?;
        let retries_left = self.retry_budget(&request);

        let token = self.credentials.get_token_async().await?;
        let body = request.take_body();
        let wire = self.prepare(&request, url, body, &token)?;

        debug!(retries_left, "Dispatching request");
        let response = self.transport.send_async(wire).await?;

        match classify(response, retries_left) {
            Outcome::Success(response) => {
                debug!(status = response.status(), "Request succeeded");
                Ok(response)
            }
            Outcome::RetryableAuthFailure { message, .. } => {
                warn!(%message, "Credential rejected; caller must refresh and resubmit");
                Err(GraphError::RetryNeeded { status: 401 })
            }
            Outcome::Fatal(err) => Err(Self::log_failure(1, err)),
        }
    }

    /// [`execute_async`](Self::execute_async), abandoned as soon as `cancel`
    /// fires
    ///
    /// Cancellation drops the in-flight exchange and never triggers a
    /// refresh.
    ///
    /// # Errors
    /// `GraphError::Cancelled` if `cancel` fires first, otherwise as
    /// [`execute_async`](Self::execute_async).
    pub async fn execute_async_with_cancel(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }

        let method = request.method().clone();
        let path = request.path().to_string();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(%method, %path, "Request cancelled by caller");
                Err(GraphError::Cancelled)
            }
            result = self.execute_async(request) => result,
        }
    }

    /// [`execute_async`](Self::execute_async) and decode the body as JSON
    ///
    /// # Errors
    /// See [`execute_async`](Self::execute_async); also `GraphError::Decode`.
    pub async fn execute_json_async<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Option<T>> {
        self.execute_async(request).await?.json()
    }

    fn retry_budget(&self, request: &ApiRequest) -> u32 {
        request.max_retries_override().unwrap_or(self.config.max_retries)
    }

    /// Assemble the wire request
    ///
    /// Caller headers go in first, then `Accept` (structured calls only),
    /// `Content-Type` for JSON bodies the caller did not type, the default
    /// `User-Agent` if none was given, and finally `Authorization`.
    fn prepare(
        &self,
        request: &ApiRequest,
        url: String,
        body: RequestBody,
        token: &str,
    ) -> Result<WireRequest> {
        let mut headers = request.headers().clone();

        if !request.is_raw() {
            headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        if request.is_json_body() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        if !headers.contains_key(USER_AGENT) {
            let user_agent = HeaderValue::from_str(&self.config.user_agent)
                .map_err(|e| GraphError::Config(format!("Invalid user_agent: {e}")))?;
            headers.insert(USER_AGENT, user_agent);
        }

        let mut authorization = HeaderValue::from_str(&format!("{BEARER_PREFIX}{token}"))
            .map_err(|_| GraphError::AuthenticationFailure {
                status: None,
                message: "Credential contains characters not allowed in a header".into(),
                code: None,
            })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        Ok(WireRequest {
            method: request.method().clone(),
            url,
            headers,
            body,
            timeout: request.timeout_override().unwrap_or(self.config.request_timeout),
        })
    }

    fn log_failure(attempt: u32, err: GraphError) -> GraphError {
        warn!(attempt, status = ?err.status(), kind = err.label(), error = %err, "Request failed");
        err
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("api_url", &self.config.api_url)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}
