//! Domain types and models

pub mod credential;
pub mod wire;

pub use credential::Credential;
pub use wire::{AppGrant, RefreshGrant, TokenResponse};
