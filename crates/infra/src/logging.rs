//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to get them on stderr.

use std::str::FromStr;

use graphlink_domain::GraphError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid and the caller's
/// default does not parse
pub const DEFAULT_FILTER: &str = "graphlink_core=info,graphlink_infra=info,warn";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "pretty" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(GraphError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// Install the global subscriber
///
/// Reads the filter from `RUST_LOG`, falling back to `default_filter`.
/// Returns `false` if a global subscriber was already installed, which
/// makes repeated calls harmless.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> bool {
    match try_init(default_filter, format) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Tracing subscriber already installed");
            false
        }
    }
}

fn try_init(default_filter: &str, format: LogFormat) -> Result<(), TryInitError> {
    let filter = env_filter(default_filter);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Plain);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn second_init_is_a_no_op() {
        // The first call may lose to another test in this binary
        init_tracing("warn", LogFormat::Plain);
        assert!(!init_tracing("warn", LogFormat::Json));
    }
}
