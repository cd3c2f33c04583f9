//! Transport layer for the SQL gateway.
//!
//! The gateway is served over HTTP only; the trait keeps the server loop separate
//! from the composition root in `main`.

pub mod http;

pub use http::HttpTransport;

use crate::error::ServerError;
use std::future::Future;

/// A server that exposes the gateway to clients.
pub trait Transport: Send + Sync {
    /// Start the transport and serve requests until shutdown.
    fn run(&self) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
