//! Transport layer for the console API.
//!
//! - HTTP: JSON routes consumed by the web console
//! - Handlers: per-route request extraction and connection lifecycle

pub mod handlers;
pub mod http;

pub use handlers::AppState;
pub use http::{HttpTransport, build_router, cors_layer};

use crate::error::DbResult;
use std::future::Future;

/// A server front end.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
