//! # Interpose Testing
//!
//! Testing utilities and helpers for the Interpose request pipeline.
//!
//! This crate provides:
//! - Deterministic request ids and a scripted fake network
//! - An event recorder that captures every life-cycle event
//! - A fluent Given-When-Then harness for single requests
//! - Assertion helpers for life-cycle ordering
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use interpose_core::{CapturedRequest, EventName, Handler, Method, Response, StatusCode};
//! use interpose_testing::PipelineTest;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! PipelineTest::new()
//!     .given_handlers([Handler::get("/me", |_| async {
//!         Ok(Some(Response::text(StatusCode::OK, "mocked")))
//!     })
//!     .unwrap()])
//!     .when_request(CapturedRequest::builder(Method::GET, "http://app.test/me").build().unwrap())
//!     .then_events(&[
//!         EventName::RequestStart,
//!         EventName::RequestMatch,
//!         EventName::RequestEnd,
//!         EventName::ResponseMocked,
//!     ])
//!     .then_network_calls(0)
//!     .run()
//!     .await;
//! # }
//! ```

/// Deterministic stand-ins for the network and id generation
pub mod mocks;

/// Life-cycle event recording
pub mod recorder;


/// Helper assertions for life-cycle events
pub mod assertions;

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Lowercase path segments such as `users` or `a1b2`.
    pub fn path_segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,11}"
    }

    /// Absolute paths with one to four segments.
    pub fn path() -> impl Strategy<Value = String> {
        prop::collection::vec(path_segment(), 1..=4).prop_map(|segments| format!("/{}", segments.join("/")))
    }

    /// Absolute `http(s)` URLs on a `.test` host.
    pub fn url() -> impl Strategy<Value = String> {
        (prop_oneof![Just("http"), Just("https")], path_segment(), path())
            .prop_map(|(scheme, host, path)| format!("{scheme}://{host}.test{path}"))
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FakeNetwork, SequentialIdGenerator};
pub use pipeline_test::PipelineTest;
pub use recorder::EventRecorder;
