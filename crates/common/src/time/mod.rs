//! Time utilities and abstractions
//!
//! - **Clock abstractions**: real and mock wall-clock time
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use graphlink_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.now() - start).num_seconds(), 5);
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
