//! The real-network capability handed over by the capture layer.
//!
//! For every captured request the capture layer supplies a [`Proceed`]: a
//! one-shot capability that performs the actual network exchange. The
//! pipeline calls it at most once, and only on the bypass paths.

use crate::response::Response;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Failure of the real network exchange.
///
/// These errors are propagated to the original caller unchanged; the
/// pipeline never masks them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Could not connect to the remote host.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The exchange did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other transport level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Boxed future resolving to the real response.
pub type NetworkFuture = Pin<Box<dyn Future<Output = Result<Response, NetworkError>> + Send>>;

/// One-shot capability performing the real network exchange.
pub struct Proceed {
    exchange: Box<dyn FnOnce() -> NetworkFuture + Send>,
}

impl Proceed {
    /// Wrap a closure that performs the exchange when called.
    pub fn new<F, Fut>(exchange: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response, NetworkError>> + Send + 'static,
    {
        Self {
            exchange: Box::new(move || Box::pin(exchange())),
        }
    }

    /// A capability that always answers with `response`.
    #[must_use]
    pub fn respond_with(response: Response) -> Self {
        Self::new(move || async move { Ok(response) })
    }

    /// Perform the exchange.
    ///
    /// # Errors
    ///
    /// Returns whatever [`NetworkError`] the underlying exchange produced.
    pub async fn run(self) -> Result<Response, NetworkError> {
        (self.exchange)().await
    }
}

impl fmt::Debug for Proceed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proceed").finish_non_exhaustive()
    }
}
