//! # graphlink Core
//!
//! Request pipeline logic - no concrete network stack.
//!
//! This crate contains:
//! - The transport port and wire request/response types
//! - Response classification
//! - The credential store and background renewal task
//! - The blocking and async request pipelines
//!
//! ## Architecture Principles
//! - Depends only on `graphlink-domain` and `graphlink-common`
//! - Network access goes through the [`Transport`] trait
//! - The reqwest adapter lives in `graphlink-infra`

pub mod auth;
pub mod http;
pub mod pipeline;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use auth::{AutoRefresh, AutoRefreshConfig, CredentialStore};
pub use http::{
    classify, ApiResponse, ErrorDetails, Outcome, RequestBody, Transport, WireRequest,
    WireResponse,
};
pub use pipeline::{ApiRequest, RequestPipeline};
