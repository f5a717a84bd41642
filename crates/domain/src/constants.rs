//! Domain constants
//!
//! Endpoint names, header values and configuration defaults.

use std::time::Duration;

// Credential endpoints, relative to the configured API root
pub const APP_TOKEN_ENDPOINT: &str = "app";
pub const REFRESH_TOKEN_ENDPOINT: &str = "refresh";
pub const REVOKE_TOKEN_ENDPOINT: &str = "revoke";

// Header values
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const BEARER_PREFIX: &str = "Bearer ";
pub const PRODUCT_NAME: &str = "graphlink";

// Handler defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_OFFSET: Duration = Duration::from_secs(30);
pub const DEFAULT_FRESH_BUFFER: Duration = Duration::from_secs(2);
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;

/// Default `User-Agent` value: `<product> <version>`.
pub fn default_user_agent() -> String {
    format!("{} {}", PRODUCT_NAME, env!("CARGO_PKG_VERSION"))
}
