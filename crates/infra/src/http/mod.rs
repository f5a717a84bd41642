//! reqwest adapter for the core transport port

pub mod client;

pub use client::{ReqwestTransport, ReqwestTransportBuilder};
