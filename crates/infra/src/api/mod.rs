//! Client façade for the graph API

pub mod client;

pub use client::{GraphClient, GraphClientBuilder};
