//! # graphlink Infrastructure
//!
//! Concrete implementations of the `graphlink-core` ports.
//!
//! This crate contains:
//! - The reqwest-backed [`Transport`](graphlink_core::Transport)
//! - Configuration loading from environment variables and files
//! - Tracing subscriber setup
//! - The [`GraphClient`] façade
//!
//! ## Architecture
//! - Implements traits defined in `graphlink-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;

// Re-export commonly used items
pub use api::{GraphClient, GraphClientBuilder};
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use logging::{init_tracing, LogFormat};
