//! HTTP exchange primitives: the transport port, response classification and
//! the response type handed back to callers.

pub mod classifier;
pub mod ports;
pub mod response;

pub use classifier::{classify, classify_credential, ErrorDetails, Outcome};
pub use ports::{ByteStream, RequestBody, Transport, WireRequest, WireResponse};
pub use response::ApiResponse;
