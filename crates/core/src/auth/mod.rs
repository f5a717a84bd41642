//! Credential lifecycle: the shared store and its optional background
//! renewal task.

pub mod auto_refresh;
pub mod credential_store;

pub use auto_refresh::{AutoRefresh, AutoRefreshConfig};
pub use credential_store::CredentialStore;
