//! HTTP transport shared by all adapters.

pub mod http;

pub use http::{HttpTransport, RequestAuth, TransportError};
