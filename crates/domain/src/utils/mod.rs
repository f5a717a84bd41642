//! Utility helpers shared across domain types

pub mod serde;

pub use self::serde::{duration_millis, epoch_millis};
