use std::time::Duration;

use async_trait::async_trait;
use graphlink_core::http::{RequestBody, Transport, WireRequest, WireResponse};
use graphlink_domain::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_POOL_MAX_IDLE_PER_HOST};
use graphlink_domain::{ClientConfig, GraphError, Result, TransportError, TransportErrorKind};
use once_cell::sync::OnceCell;
use reqwest::{blocking, Client as ReqwestClient};
use tracing::debug;

use crate::errors::{body_error, IntoTransportError};

/// reqwest-backed [`Transport`].
///
/// Holds one async client, built eagerly, and one blocking client, built on
/// first use of the blocking path. Both share the same connection settings.
/// The transport performs a single exchange per call and never retries.
///
/// Once the blocking client has been initialised, the transport must be
/// dropped outside of an async runtime.
pub struct ReqwestTransport {
    client: ReqwestClient,
    blocking: OnceCell<blocking::Client>,
    settings: TransportSettings,
}

#[derive(Debug, Clone)]
struct TransportSettings {
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    no_proxy: bool,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport with connection settings taken from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    fn blocking_client(&self) -> std::result::Result<&blocking::Client, TransportError> {
        self.blocking.get_or_try_init(|| {
            debug!("initialising blocking HTTP client");
            let settings = &self.settings;
            let mut builder = blocking::Client::builder()
                .connect_timeout(settings.connect_timeout)
                .pool_max_idle_per_host(settings.pool_max_idle_per_host)
                .pool_idle_timeout(settings.pool_idle_timeout);
            if settings.no_proxy {
                builder = builder.no_proxy();
            }
            builder.build().map_err(|err| {
                TransportError::new(
                    TransportErrorKind::Request,
                    format!("failed to build blocking HTTP client: {err}"),
                )
            })
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn send(&self, request: WireRequest) -> std::result::Result<WireResponse, TransportError> {
        let WireRequest { method, url, headers, body, timeout } = request;
        let body: Option<blocking::Body> = match body {
            RequestBody::Empty => None,
            RequestBody::Text(text) => Some(text.into()),
            RequestBody::Bytes(bytes) => Some(bytes.into()),
            RequestBody::Stream(_) => {
                return Err(TransportError::new(
                    TransportErrorKind::Unsupported,
                    "streamed bodies require the async transport",
                ))
            }
        };

        let client = self.blocking_client()?;
        let mut builder =
            client.request(method.clone(), url.as_str()).headers(headers).timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().map_err(IntoTransportError::into_transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        debug!(%method, %url, status, "received HTTP response");

        let body = response.bytes().map(|bytes| bytes.to_vec()).map_err(body_error);
        Ok(WireResponse { status, headers, body })
    }

    async fn send_async(
        &self,
        request: WireRequest,
    ) -> std::result::Result<WireResponse, TransportError> {
        let WireRequest { method, url, headers, body, timeout } = request;

        let mut builder =
            self.client.request(method.clone(), url.as_str()).headers(headers).timeout(timeout);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(IntoTransportError::into_transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        debug!(%method, %url, status, "received HTTP response");

        let body = response.bytes().await.map(|bytes| bytes.to_vec()).map_err(body_error);
        Ok(WireResponse { status, headers, body })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("settings", &self.settings)
            .field("blocking_initialised", &self.blocking.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    no_proxy: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            no_proxy: false,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Take connection settings from `config`.
    pub fn with_config(self, config: &ClientConfig) -> Self {
        self.connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Idle connections kept per host; shared by every handler using this
    /// transport.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Ignore system proxy settings.
    pub fn no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let settings = TransportSettings {
            connect_timeout: self.connect_timeout,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            pool_idle_timeout: self.pool_idle_timeout,
            no_proxy: self.no_proxy,
        };

        let mut builder = ReqwestClient::builder()
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .pool_idle_timeout(settings.pool_idle_timeout);
        if settings.no_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|err| GraphError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(ReqwestTransport { client, blocking: OnceCell::new(), settings })
    }
}
