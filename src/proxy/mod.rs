//! Proxy module
//!
//! Handles request forwarding to upstream AI providers.

pub mod upstream;

pub use upstream::{ByteStream, UpstreamClient, UpstreamStream};
