//! # Interpose Runtime
//!
//! Runtime for the Interpose request life-cycle pipeline.
//!
//! This crate turns the vocabulary of `interpose-core` into a working
//! interception session: it decides, for every captured request, whether a
//! handler answers it with a mocked response or whether it goes to the real
//! network, and it reports each step as an ordered life-cycle event.
//!
//! ## Core Components
//!
//! - **MockServer**: session context owning gate, registry, bus and config
//! - **Orchestrator**: per-request state machine emitting life-cycle events
//! - **EventBus**: ordered, awaited publish/subscribe keyed by event name
//! - **HandlerRegistry**: initial handlers plus runtime overrides
//! - **InterceptedClient**: capture layer for `reqwest`
//!
//! ## Example
//!
//! ```
//! use interpose_core::{CapturedRequest, EventName, Handler, Method, Proceed, Response, StatusCode};
//! use interpose_runtime::MockServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::new([Handler::post("https://api.test/login", |_| async {
//!     Ok(Some(Response::json(StatusCode::OK, &serde_json::json!({ "token": "t" }))))
//! })?]);
//!
//! server.events().on(EventName::ResponseMocked, |event| async move {
//!     println!("mocked {}", event.request_id());
//! });
//! server.listen();
//!
//! let request = CapturedRequest::builder(Method::POST, "https://api.test/login").build()?;
//! let settlement = server.handle(request, Proceed::respond_with(Response::ok())).await?;
//! assert!(settlement.is_mocked());
//! # Ok(())
//! # }
//! ```

/// Ordered life-cycle event bus
pub mod event_bus;

/// Active-state gate and session statistics
pub mod gate;

/// First-match handler selection
pub mod matcher;

/// Panic-safe resolver invocation
pub mod invoker;

/// Handler sequence with runtime overrides
pub mod registry;

/// Pipeline configuration
pub mod config;

/// Per-request life-cycle orchestration
pub mod orchestrator;

/// The mock server session context
pub mod server;

/// `reqwest` capture layer
pub mod client;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the pipeline runtime
pub mod error {
    use interpose_core::{Method, NetworkError, RequestId, ResolverError};
    use thiserror::Error;

    /// Errors that fail a request passing through the pipeline.
    ///
    /// Resolver failures only surface here under the `reject` strategy; by
    /// default they are reported as `unhandledException` events and the
    /// request continues to the real network.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum PipelineError {
        /// The real network exchange failed.
        ///
        /// The error is passed through untouched.
        #[error(transparent)]
        Network(#[from] NetworkError),

        /// No handler matched and unhandled requests are configured as errors.
        #[error("Unhandled request {method} {url} ({request_id})")]
        UnhandledRequest {
            /// Request method
            method: Method,
            /// Request URL
            url: String,
            /// Correlation id of the rejected request
            request_id: RequestId,
        },

        /// The resolver failed and resolver errors are configured to reject.
        #[error("Resolver failed: {0}")]
        Resolver(ResolverError),
    }
}

// Re-export commonly used types
pub use client::{ClientError, InterceptedClient};
pub use config::{ConfigError, PipelineConfig, ResolverErrorStrategy, UnhandledRequestStrategy};
pub use error::PipelineError;
pub use event_bus::{EventBus, Listener, Subscription};
pub use gate::SessionStats;
pub use orchestrator::Settlement;
pub use server::{MockServer, MockServerBuilder};
