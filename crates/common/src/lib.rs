//! Shared utilities for graphlink crates.
//!
//! Currently a single concern: the wall-clock abstraction that lets the
//! credential store's expiry and freshness checks run against controlled
//! time in tests.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
