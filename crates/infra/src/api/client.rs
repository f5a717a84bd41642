//! Graph API client
//!
//! Wires one configuration, one shared transport, one credential store and
//! one request pipeline together, and layers convenience calls on top.

use std::sync::Arc;

use graphlink_common::time::Clock;
use graphlink_core::auth::{AutoRefresh, AutoRefreshConfig, CredentialStore};
use graphlink_core::http::{ApiResponse, Transport};
use graphlink_core::pipeline::{ApiRequest, RequestPipeline};
use graphlink_domain::{ClientConfig, GraphError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config;
use crate::http::ReqwestTransport;

/// Authenticated client for the graph API
///
/// Cheap to clone; clones share the transport, connection pool and
/// credential.
#[derive(Clone)]
pub struct GraphClient {
    pipeline: Arc<RequestPipeline>,
}

impl GraphClient {
    /// Client over a reqwest transport built from `config`
    ///
    /// # Errors
    /// Returns `GraphError::Config` if `config` is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Client configured from `GRAPHLINK_*` variables or a config file
    ///
    /// # Errors
    /// See [`config::load`] and [`GraphClient::new`].
    pub fn from_environment() -> Result<Self> {
        Self::new(config::load()?)
    }

    pub fn builder() -> GraphClientBuilder {
        GraphClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        self.pipeline.config()
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.pipeline.credentials()
    }

    /// Background renewal task bound to this client's credential
    ///
    /// The task is not started; call [`AutoRefresh::start`] from within a
    /// runtime.
    pub fn auto_refresh(&self, config: AutoRefreshConfig) -> AutoRefresh {
        AutoRefresh::new(Arc::clone(self.credentials()), config)
    }

    // ---------------------------------------------------------------------
    // Blocking API
    // ---------------------------------------------------------------------

    /// Execute with refresh-and-resend on 401
    ///
    /// # Errors
    /// See [`RequestPipeline::execute`].
    pub fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.pipeline.execute(request)
    }

    /// GET `path` and decode the JSON body; `None` for an empty body
    ///
    /// # Errors
    /// See [`RequestPipeline::execute`]; also `GraphError::Decode`.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.pipeline.execute_json(&ApiRequest::get(path))
    }

    /// POST `body` as JSON to `path` and decode the JSON response
    ///
    /// # Errors
    /// See [`GraphClient::get_json`]; also `GraphError::InvalidRequest` if
    /// `body` cannot be serialized.
    pub fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.pipeline.execute_json(&ApiRequest::post(path).json(body)?)
    }

    /// PUT `body` as JSON to `path` and decode the JSON response
    ///
    /// # Errors
    /// See [`GraphClient::post_json`].
    pub fn put_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.pipeline.execute_json(&ApiRequest::put(path).json(body)?)
    }

    /// PATCH `body` as JSON to `path` and decode the JSON response
    ///
    /// # Errors
    /// See [`GraphClient::post_json`].
    pub fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.pipeline.execute_json(&ApiRequest::patch(path).json(body)?)
    }

    /// # Errors
    /// See [`RequestPipeline::execute`].
    pub fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.pipeline.execute(&ApiRequest::delete(path))
    }

    /// Revoke the refresh token and forget the credential
    ///
    /// # Errors
    /// See [`CredentialStore::revoke`].
    pub fn revoke(&self) -> Result<()> {
        self.credentials().revoke()
    }

    // ---------------------------------------------------------------------
    // Async API
    // ---------------------------------------------------------------------

    /// Single dispatch-and-classify step
    ///
    /// A retryable 401 comes back as `GraphError::RetryNeeded`; use
    /// [`send_async`](Self::send_async) to have it handled.
    ///
    /// # Errors
    /// See [`RequestPipeline::execute_async`].
    pub async fn execute_async(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.pipeline.execute_async(request).await
    }

    /// Execute, refreshing the credential and resubmitting on each
    /// `RetryNeeded` until the retry budget is spent
    ///
    /// Streamed requests cannot be resubmitted and get a budget of zero, so
    /// a 401 on one fails with `GraphError::Unauthorized`.
    ///
    /// # Errors
    /// See [`RequestPipeline::execute_async`]; never `RetryNeeded`.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send_async(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut remaining = request.max_retries_override().unwrap_or(self.config().max_retries);
        let mut request = request;

        loop {
            let Some(next) = request.try_clone() else {
                debug!("Streamed request, sending without retry budget");
                return self.pipeline.execute_async(request.max_retries(0)).await;
            };

            match self.pipeline.execute_async(request.max_retries(remaining)).await {
                Err(GraphError::RetryNeeded { .. }) => {
                    info!(remaining, "Refreshing credential before resubmitting");
                    self.credentials().refresh_async().await?;
                    remaining = remaining.saturating_sub(1);
                    request = next;
                }
                outcome => return outcome,
            }
        }
    }

    /// # Errors
    /// See [`GraphClient::send_async`]; also `GraphError::Decode`.
    pub async fn get_json_async<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.send_async(ApiRequest::get(path)).await?.json()
    }

    /// # Errors
    /// See [`GraphClient::post_json`].
    pub async fn post_json_async<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_async(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// # Errors
    /// See [`GraphClient::post_json`].
    pub async fn put_json_async<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_async(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// # Errors
    /// See [`GraphClient::post_json`].
    pub async fn patch_json_async<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_async(ApiRequest::patch(path).json(body)?).await?.json()
    }

    /// # Errors
    /// See [`GraphClient::send_async`].
    pub async fn delete_async(&self, path: &str) -> Result<ApiResponse> {
        self.send_async(ApiRequest::delete(path)).await
    }

    /// # Errors
    /// See [`CredentialStore::revoke_async`].
    pub async fn revoke_async(&self) -> Result<()> {
        self.credentials().revoke_async().await
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient").field("pipeline", &self.pipeline).finish()
    }
}

/// Builder for [`GraphClient`]
///
/// Only the configuration is required. Without a transport, a
/// [`ReqwestTransport`] is built from the configuration.
#[derive(Default)]
pub struct GraphClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GraphClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `transport` instead of a reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Read credential expiry against `clock`
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// Returns `GraphError::Config` if no configuration was given, it fails
    /// validation, or the default transport cannot be built.
    pub fn build(self) -> Result<GraphClient> {
        let config =
            self.config.ok_or_else(|| GraphError::Config("GraphClient requires a config".into()))?;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config)?),
        };
        let credentials = Arc::new(match self.clock {
            Some(clock) => CredentialStore::with_clock(config.clone(), Arc::clone(&transport), clock),
            None => CredentialStore::new(config.clone(), Arc::clone(&transport)),
        });

        debug!(api_url = %config.api_url, "GraphClient built");
        Ok(GraphClient { pipeline: Arc::new(RequestPipeline::new(config, transport, credentials)) })
    }
}
