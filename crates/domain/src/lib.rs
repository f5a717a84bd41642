//! # graphlink Domain
//!
//! Domain types shared by every graphlink crate.
//!
//! This crate contains:
//! - The error taxonomy and `Result` alias
//! - The handler configuration struct
//! - The bearer credential model and credential-endpoint wire types
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other graphlink crates
//! - Only external dependencies allowed
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
