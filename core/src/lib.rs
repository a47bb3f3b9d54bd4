//! # Interpose Core
//!
//! Core types for the Interpose request life-cycle pipeline.
//!
//! This crate holds the vocabulary shared by the runtime and the testing
//! kit. It performs no I/O and holds no global state.
//!
//! ## Core Concepts
//!
//! - **CapturedRequest**: immutable snapshot of an intercepted outbound request
//! - **RequestId**: correlation token attached to every event of one request
//! - **Handler**: route predicate paired with a resolver; first match wins
//! - **ResolutionOutcome**: mocked, explicit pass-through, unhandled, or error
//! - **LifeCycleEvent**: ordered notifications describing each request's fate
//! - **Proceed**: one-shot capability performing the real network exchange
//!
//! ## Architecture Principles
//!
//! - Resolvers are opaque, injected capabilities
//! - Handler patterns are validated at registration, never at match time
//! - Resolver failures are values, not control flow
//!
//! ## Example
//!
//! ```
//! use interpose_core::{CapturedRequest, Handler, Response};
//! use http::{Method, StatusCode};
//!
//! let handler = Handler::get("https://api.test/users/*", |request| async move {
//!     Ok(Some(Response::text(StatusCode::OK, format!("user at {}", request.path()))))
//! })
//! .unwrap();
//!
//! let request = CapturedRequest::builder(Method::GET, "https://api.test/users/42")
//!     .build()
//!     .unwrap();
//!
//! assert!(handler.accepts(request.method(), request.url()));
//! ```

/// Captured request snapshots
pub mod request;

/// Synthetic and real responses
pub mod response;

/// Request identifiers and their generators
pub mod id;

/// Handlers, URL patterns and the resolver seam
pub mod handler;

/// Normalized resolution outcomes
pub mod outcome;

/// Life-cycle event names and payloads
pub mod event;

/// Real-network capability supplied by the capture layer
pub mod network;

// Re-export commonly used types
pub use event::{EventName, EventNameError, LifeCycleEvent};
pub use handler::{Handler, HandlerError, Resolver, ResolverError, ResolverFuture, UrlPattern};
pub use id::{IdGenerator, RandomIdGenerator, RequestId};
pub use network::{NetworkError, NetworkFuture, Proceed};
pub use outcome::ResolutionOutcome;
pub use request::{CapturedRequest, CapturedRequestBuilder, RequestError};
pub use response::Response;

pub use bytes::Bytes;
pub use http::{HeaderMap, Method, StatusCode, Uri};
