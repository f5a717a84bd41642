//! Authenticated request pipeline

pub mod handler;
pub mod request;

pub use handler::RequestPipeline;
pub use request::ApiRequest;
