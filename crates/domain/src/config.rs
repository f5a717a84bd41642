//! Handler configuration
//!
//! A single explicit struct constructed once at startup and handed to the
//! transport, credential store and pipeline constructors. Optional fields
//! carry documented defaults; [`ClientConfig::validate`] fails fast on
//! anything required that is missing or malformed.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    default_user_agent, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FRESH_BUFFER, DEFAULT_MAX_RETRIES,
    DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_REFRESH_OFFSET, DEFAULT_REQUEST_TIMEOUT,
};
use crate::errors::{GraphError, Result};
use crate::utils::duration_millis;

/// Long-lived credentials exchanged at the `app` endpoint for a bearer token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryCredentials {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
}

impl PrimaryCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for PrimaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for one handler instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root API URL (e.g., "https://graph.example.com/v1")
    pub api_url: String,

    /// Primary credentials for token acquisition
    pub credentials: PrimaryCredentials,

    /// `User-Agent` sent on every request (default: `graphlink <version>`)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Resends allowed after a 401 on the synchronous path (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout (default: 30s)
    #[serde(
        rename = "request_timeout_ms",
        default = "default_request_timeout",
        with = "duration_millis"
    )]
    pub request_timeout: Duration,

    /// Connection establishment timeout (default: 10s)
    #[serde(
        rename = "connect_timeout_ms",
        default = "default_connect_timeout",
        with = "duration_millis"
    )]
    pub connect_timeout: Duration,

    /// Subtracted from the backend expiry to get the refresh threshold
    /// (default: 30s)
    #[serde(
        rename = "refresh_offset_ms",
        default = "default_refresh_offset",
        with = "duration_millis"
    )]
    pub refresh_offset: Duration,

    /// Minimum spacing between refresh calls (default: 2s)
    #[serde(
        rename = "fresh_buffer_ms",
        default = "default_fresh_buffer",
        with = "duration_millis"
    )]
    pub fresh_buffer: Duration,

    /// Idle connections kept per host by the transport pool (default: 8)
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_refresh_offset() -> Duration {
    DEFAULT_REFRESH_OFFSET
}

fn default_fresh_buffer() -> Duration {
    DEFAULT_FRESH_BUFFER
}

fn default_pool_max_idle_per_host() -> usize {
    DEFAULT_POOL_MAX_IDLE_PER_HOST
}

impl ClientConfig {
    /// Build a configuration with every optional field at its default
    ///
    /// # Errors
    /// Returns `GraphError::Config` if the URL or credentials are invalid.
    pub fn new(api_url: impl Into<String>, credentials: PrimaryCredentials) -> Result<Self> {
        let config = Self {
            api_url: api_url.into(),
            credentials,
            user_agent: default_user_agent(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            refresh_offset: DEFAULT_REFRESH_OFFSET,
            fresh_buffer: DEFAULT_FRESH_BUFFER,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_offset(mut self, offset: Duration) -> Self {
        self.refresh_offset = offset;
        self
    }

    pub fn with_fresh_buffer(mut self, buffer: Duration) -> Self {
        self.fresh_buffer = buffer;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check required fields
    ///
    /// # Errors
    /// Returns `GraphError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.api_url.trim())
            .map_err(|e| GraphError::Config(format!("Invalid api_url '{}': {}", self.api_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GraphError::Config(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let required = [
            ("credentials.username", &self.credentials.username),
            ("credentials.password", &self.credentials.password),
            ("credentials.client_id", &self.credentials.client_id),
            ("credentials.client_secret", &self.credentials.client_secret),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(GraphError::Config(format!("{name} must not be blank")));
        }

        if self.request_timeout.is_zero() {
            return Err(GraphError::Config("request_timeout must be greater than zero".into()));
        }

        if self.user_agent.trim().is_empty() {
            return Err(GraphError::Config("user_agent must not be blank".into()));
        }

        Ok(())
    }

    /// Resolve a path against the API root
    ///
    /// Absolute `http(s)://` URIs are returned unchanged.
    pub fn endpoint_url(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        format!("{}/{}", self.api_url.trim().trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Resolve the target of an authenticated call
    ///
    /// Like [`endpoint_url`](Self::endpoint_url), but an absolute URI must
    /// share the API root's origin (scheme, host and port), since the
    /// bearer token is attached to it.
    ///
    /// # Errors
    /// Returns `GraphError::InvalidRequest` for an unparsable or foreign
    /// absolute URI.
    pub fn request_url(&self, path: &str) -> Result<String> {
        if !is_absolute(path) {
            return Ok(self.endpoint_url(path));
        }

        let target = Url::parse(path)
            .map_err(|e| GraphError::InvalidRequest(format!("Invalid request URL '{path}': {e}")))?;
        let api = Url::parse(self.api_url.trim())
            .map_err(|e| GraphError::Config(format!("Invalid api_url '{}': {}", self.api_url, e)))?;
        if target.origin() != api.origin() {
            return Err(GraphError::InvalidRequest(format!(
                "Refusing to send credentials to {}, outside {}",
                target.origin().ascii_serialization(),
                api.origin().ascii_serialization()
            )));
        }
        Ok(path.to_string())
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> PrimaryCredentials {
        PrimaryCredentials::new("user", "pass", "client", "secret")
    }

    #[test]
    fn new_applies_defaults() {
        let config = ClientConfig::new("https://graph.example.com/v1", credentials()).unwrap();

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_offset, Duration::from_secs(30));
        assert_eq!(config.fresh_buffer, Duration::from_secs(2));
        assert!(config.user_agent.starts_with("graphlink "));
    }

    #[test]
    fn rejects_relative_url() {
        let err = ClientConfig::new("graph.example.com", credentials()).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::new("ftp://graph.example.com", credentials()).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn rejects_blank_secret() {
        let creds = PrimaryCredentials::new("user", "pass", "client", "  ");
        let err = ClientConfig::new("https://graph.example.com", creds).unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = ClientConfig::new("https://graph.example.com", credentials())
            .unwrap()
            .with_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_url_joins_with_single_slash() {
        let config = ClientConfig::new("https://graph.example.com/v1/", credentials()).unwrap();

        assert_eq!(config.endpoint_url("app"), "https://graph.example.com/v1/app");
        assert_eq!(config.endpoint_url("/nodes/42"), "https://graph.example.com/v1/nodes/42");
        assert_eq!(config.endpoint_url("https://other.example.com/x"), "https://other.example.com/x");
    }

    #[test]
    fn request_url_keeps_absolute_uris_on_the_api_origin() {
        let config = ClientConfig::new("https://graph.example.com/v1", credentials()).unwrap();

        assert_eq!(config.request_url("nodes").unwrap(), "https://graph.example.com/v1/nodes");
        assert_eq!(
            config.request_url("https://graph.example.com/v2/nodes").unwrap(),
            "https://graph.example.com/v2/nodes"
        );

        for foreign in [
            "https://evil.example.com/v1/nodes",
            "http://graph.example.com/v1/nodes",
            "https://graph.example.com:8443/v1/nodes",
        ] {
            let err = config.request_url(foreign).unwrap_err();
            assert!(matches!(err, GraphError::InvalidRequest(_)), "{foreign}: {err:?}");
        }
    }

    #[test]
    fn deserializes_with_defaults_and_millis() {
        let json = r#"{
            "api_url": "https://graph.example.com",
            "credentials": {
                "username": "u", "password": "p", "client_id": "c", "client_secret": "s"
            },
            "max_retries": 5,
            "fresh_buffer_ms": 250
        }"#;

        let config: ClientConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.fresh_buffer, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds = PrimaryCredentials::new("alice", "hunter2", "client", "s3cr3t");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
