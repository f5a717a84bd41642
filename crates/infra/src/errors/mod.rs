//! Mapping of third-party errors into graphlink error types

pub mod conversions;

pub use conversions::{body_error, IntoTransportError};
