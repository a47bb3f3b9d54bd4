//! The mock server: a session context owning the whole pipeline.
//!
//! A [`MockServer`] bundles the active gate, handler registry, event bus,
//! configuration and id generator. There is no global state; two servers
//! are fully independent.
//!
//! # Example
//!
//! ```
//! use interpose_core::{CapturedRequest, Handler, Method, Proceed, Response, StatusCode};
//! use interpose_runtime::MockServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::new([Handler::get("/health", |_| async {
//!     Ok(Some(Response::text(StatusCode::OK, "mocked")))
//! })?]);
//! server.listen();
//!
//! let request = CapturedRequest::builder(Method::GET, "http://service.test/health").build()?;
//! let settlement = server
//!     .handle(request, Proceed::respond_with(Response::text(StatusCode::OK, "real")))
//!     .await?;
//!
//! assert!(settlement.is_mocked());
//! server.close();
//! # Ok(())
//! # }
//! ```

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event_bus::EventBus;
use crate::gate::{ActiveGate, SessionStats};
use crate::orchestrator::{Orchestrator, Settlement};
use crate::registry::HandlerRegistry;
use interpose_core::{CapturedRequest, Handler, IdGenerator, Proceed, RandomIdGenerator, RequestId};
use std::fmt;
use std::sync::Arc;

struct ServerInner {
    bus: EventBus,
    gate: Arc<ActiveGate>,
    registry: Arc<HandlerRegistry>,
    ids: Arc<dyn IdGenerator>,
    orchestrator: Orchestrator,
}

/// Request interception session.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<ServerInner>,
}

impl MockServer {
    /// Create an inactive server with `handlers` as its initial sequence
    /// and default configuration.
    #[must_use]
    pub fn new(handlers: impl IntoIterator<Item = Handler>) -> Self {
        Self::builder().handlers(handlers).build()
    }

    /// Start configuring a server.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Turn interception on and start a new session.
    ///
    /// Session statistics are reset.
    pub fn listen(&self) {
        let session = self.inner.gate.activate();
        tracing::info!(
            session = session.epoch(),
            handlers = self.inner.registry.snapshot().len(),
            "Interception enabled"
        );
    }

    /// Turn interception off.
    ///
    /// Requests arriving afterwards go straight to the network without any
    /// events. Requests already in flight are not cancelled; they emit
    /// nothing further and fall through to the network.
    pub fn close(&self) {
        if self.inner.gate.deactivate() {
            tracing::info!(stats = ?self.inner.gate.stats(), "Interception disabled");
        }
    }

    /// [`close`](Self::close) and remove every event listener.
    pub fn dispose(&self) {
        self.close();
        self.inner.bus.unsubscribe_all();
    }

    /// Whether interception is on.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner.gate.is_active()
    }

    /// Prepend runtime handlers; they take precedence over existing ones.
    pub fn use_handlers(&self, handlers: impl IntoIterator<Item = Handler>) {
        self.inner.registry.prepend(handlers);
    }

    /// Drop runtime handlers, returning to the initial sequence, or replace
    /// the current sequence with `next`.
    pub fn reset_handlers(&self, next: Option<Vec<Handler>>) {
        self.inner.registry.reset(next);
    }

    /// Make used one-shot handlers eligible again.
    pub fn restore_handlers(&self) {
        self.inner.registry.restore();
    }

    /// Current handler sequence, in match order.
    #[must_use]
    pub fn list_handlers(&self) -> Vec<Arc<Handler>> {
        self.inner.registry.list()
    }

    /// Life-cycle event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Counters for the current (or last) session.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.inner.gate.stats()
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        self.inner.orchestrator.config()
    }

    /// Run a captured request through the pipeline under a fresh id.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::handle`].
    pub async fn handle(&self, request: CapturedRequest, proceed: Proceed) -> Result<Settlement, PipelineError> {
        let request_id = self.inner.ids.next_id();
        self.handle_with_id(request, request_id, proceed).await
    }

    /// Run a captured request under an id supplied by the capture layer.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::handle`].
    pub async fn handle_with_id(
        &self,
        request: CapturedRequest,
        request_id: RequestId,
        proceed: Proceed,
    ) -> Result<Settlement, PipelineError> {
        self.inner.orchestrator.handle(request, request_id, proceed).await
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer")
            .field("listening", &self.is_listening())
            .field("handlers", &self.inner.registry.snapshot().len())
            .field("config", self.config())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MockServer`].
#[derive(Default)]
pub struct MockServerBuilder {
    handlers: Vec<Handler>,
    config: PipelineConfig,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl MockServerBuilder {
    /// Append initial handlers.
    #[must_use]
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Append one initial handler.
    #[must_use]
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Use `config` instead of the default configuration.
    #[must_use]
    pub const fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom request id generator.
    #[must_use]
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Build an inactive server.
    #[must_use]
    pub fn build(self) -> MockServer {
        let bus = EventBus::new();
        let gate = Arc::new(ActiveGate::new());
        let registry = Arc::new(HandlerRegistry::new(self.handlers));
        let orchestrator = Orchestrator::new(
            bus.clone(),
            Arc::clone(&gate),
            Arc::clone(&registry),
            self.config,
        );

        MockServer {
            inner: Arc::new(ServerInner {
                bus,
                gate,
                registry,
                ids: self.ids.unwrap_or_else(|| Arc::new(RandomIdGenerator)),
                orchestrator,
            }),
        }
    }
}

impl fmt::Debug for MockServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServerBuilder")
            .field("handlers", &self.handlers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
