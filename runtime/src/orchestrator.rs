//! Per-request life-cycle orchestration.
//!
//! The orchestrator drives one captured request through the pipeline:
//!
//! 1. Check the gate. If inactive, go straight to the network; no events.
//! 2. Emit `request:start`.
//! 3. Re-check the session, then find and claim the first applicable
//!    handler and invoke its resolver.
//! 4. Re-check the session. If `close()` happened during steps 2 or 3, the
//!    request is abandoned: it goes to the network silently.
//! 5. Emit the disposition events and settle the request.
//!
//! ```text
//! mocked:        start → match → end → mocked
//! passthrough:   start → end → bypass
//! no handler:    start → unhandled → end → bypass
//! resolver err:  start → unhandledException → end → bypass
//! ```
//!
//! Every emission checks the session token first, so nothing is published
//! for a request once its session was closed.

use crate::config::{PipelineConfig, ResolverErrorStrategy, UnhandledRequestStrategy};
use crate::error::PipelineError;
use crate::event_bus::EventBus;
use crate::gate::{ActiveGate, SessionToken, Tally};
use crate::registry::HandlerRegistry;
use crate::{invoker, matcher};
use interpose_core::{CapturedRequest, LifeCycleEvent, Proceed, RequestId, ResolutionOutcome, Response};
use std::sync::Arc;

/// How a request was finally answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Answered by a resolver; the network was not contacted.
    Mocked(Response),
    /// Answered by the real network.
    Network(Response),
}

impl Settlement {
    /// The response, wherever it came from.
    #[must_use]
    pub const fn response(&self) -> &Response {
        match self {
            Self::Mocked(response) | Self::Network(response) => response,
        }
    }

    /// Take the response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Mocked(response) | Self::Network(response) => response,
        }
    }

    /// Whether the response was mocked.
    #[must_use]
    pub const fn is_mocked(&self) -> bool {
        matches!(self, Self::Mocked(_))
    }
}

/// Emits events for one request, as long as its session is open.
struct RequestEmitter<'a> {
    bus: &'a EventBus,
    gate: &'a ActiveGate,
    session: SessionToken,
}

impl RequestEmitter<'_> {
    fn is_live(&self) -> bool {
        self.gate.is_current(self.session)
    }

    async fn emit(&self, event: LifeCycleEvent) {
        if !self.is_live() {
            tracing::trace!(event = %event.name(), "Suppressed event for closed session");
            return;
        }
        self.bus.publish_while(&event, &|| self.is_live()).await;
    }
}

/// Drives captured requests through matching, resolution and dispatch.
#[derive(Debug)]
pub struct Orchestrator {
    bus: EventBus,
    gate: Arc<ActiveGate>,
    registry: Arc<HandlerRegistry>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Wire an orchestrator over shared pipeline state.
    #[must_use]
    pub const fn new(
        bus: EventBus,
        gate: Arc<ActiveGate>,
        registry: Arc<HandlerRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            bus,
            gate,
            registry,
            config,
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request through the pipeline.
    ///
    /// `proceed` is called at most once, only when the request is bypassed.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Network`] if the real network exchange failed
    /// - [`PipelineError::UnhandledRequest`] when no handler matched and the
    ///   unhandled strategy is `error`
    /// - [`PipelineError::Resolver`] when the resolver failed and the
    ///   resolver error strategy is `reject`
    #[tracing::instrument(
        name = "interpose.request",
        skip_all,
        fields(request_id = %request_id, method = %request.method(), url = %request.url())
    )]
    pub async fn handle(
        &self,
        request: CapturedRequest,
        request_id: RequestId,
        proceed: Proceed,
    ) -> Result<Settlement, PipelineError> {
        let Some(session) = self.gate.session() else {
            tracing::trace!("Interception inactive, forwarding to network");
            return Ok(Settlement::Network(proceed.run().await?));
        };

        let emitter = RequestEmitter {
            bus: &self.bus,
            gate: &self.gate,
            session,
        };

        self.gate.record(Tally::Request);
        metrics::counter!("interpose.requests.total").increment(1);

        emitter
            .emit(LifeCycleEvent::RequestStart {
                request: request.clone(),
                request_id: request_id.clone(),
            })
            .await;

        if !emitter.is_live() {
            tracing::debug!("Session closed before matching, abandoning request");
            return Ok(Settlement::Network(proceed.run().await?));
        }

        let handlers = self.registry.snapshot();
        let claimed = matcher::find_handler(&request, &handlers);
        let outcome = match claimed {
            Some(handler) => {
                tracing::debug!(handler = %handler, "Handler matched");
                invoker::invoke(handler, request.clone()).await
            },
            None => ResolutionOutcome::Unhandled,
        };

        let live = emitter.is_live();
        // a one-shot handler stays used only once its mocked response is delivered
        if let Some(handler) = claimed.filter(|_| !(live && outcome.is_mocked())) {
            handler.release();
        }

        if !live {
            tracing::debug!(
                outcome = outcome.label(),
                "Session closed during resolution, abandoning request"
            );
            return Ok(Settlement::Network(proceed.run().await?));
        }

        tracing::debug!(outcome = outcome.label(), "Request resolved");

        match outcome {
            ResolutionOutcome::Mocked(response) => {
                emitter
                    .emit(LifeCycleEvent::RequestMatch {
                        request: request.clone(),
                        request_id: request_id.clone(),
                    })
                    .await;
                emitter
                    .emit(LifeCycleEvent::RequestEnd {
                        request,
                        request_id: request_id.clone(),
                    })
                    .await;

                self.gate.record(Tally::Mocked);
                metrics::counter!("interpose.requests.mocked").increment(1);

                emitter
                    .emit(LifeCycleEvent::ResponseMocked {
                        response: response.clone(),
                        request_id,
                    })
                    .await;
                Ok(Settlement::Mocked(response))
            },

            ResolutionOutcome::PassThroughExplicit => {
                if self.config.warn_on_empty_resolution {
                    tracing::warn!(
                        "Handler matched {} {} but its resolver returned no mocked response; performing request as-is",
                        request.method(),
                        request.url()
                    );
                }
                emitter
                    .emit(LifeCycleEvent::RequestEnd {
                        request,
                        request_id: request_id.clone(),
                    })
                    .await;
                self.bypass(&emitter, request_id, proceed).await
            },

            ResolutionOutcome::Unhandled => {
                self.gate.record(Tally::Unhandled);
                metrics::counter!("interpose.requests.unhandled").increment(1);

                match self.config.on_unhandled_request {
                    UnhandledRequestStrategy::Bypass => {},
                    UnhandledRequestStrategy::Warn => tracing::warn!(
                        "Captured a request without a matching handler: {} {}",
                        request.method(),
                        request.url()
                    ),
                    UnhandledRequestStrategy::Error => tracing::error!(
                        "Captured a request without a matching handler: {} {}",
                        request.method(),
                        request.url()
                    ),
                }

                emitter
                    .emit(LifeCycleEvent::RequestUnhandled {
                        request: request.clone(),
                        request_id: request_id.clone(),
                    })
                    .await;
                emitter
                    .emit(LifeCycleEvent::RequestEnd {
                        request: request.clone(),
                        request_id: request_id.clone(),
                    })
                    .await;

                if self.config.on_unhandled_request == UnhandledRequestStrategy::Error {
                    return Err(PipelineError::UnhandledRequest {
                        method: request.method().clone(),
                        url: request.url().to_string(),
                        request_id,
                    });
                }
                self.bypass(&emitter, request_id, proceed).await
            },

            ResolutionOutcome::ResolverError(error) => {
                self.gate.record(Tally::Exception);
                metrics::counter!("interpose.resolver.exceptions").increment(1);
                tracing::warn!(
                    error = %error,
                    panicked = error.is_panic(),
                    "Resolver failed for {} {}",
                    request.method(),
                    request.url()
                );

                emitter
                    .emit(LifeCycleEvent::UnhandledException {
                        error: error.clone(),
                        request: request.clone(),
                        request_id: request_id.clone(),
                    })
                    .await;
                emitter
                    .emit(LifeCycleEvent::RequestEnd {
                        request,
                        request_id: request_id.clone(),
                    })
                    .await;

                match self.config.on_resolver_error {
                    ResolverErrorStrategy::Bypass => self.bypass(&emitter, request_id, proceed).await,
                    ResolverErrorStrategy::Reject => Err(PipelineError::Resolver(error)),
                }
            },
        }
    }

    async fn bypass(
        &self,
        emitter: &RequestEmitter<'_>,
        request_id: RequestId,
        proceed: Proceed,
    ) -> Result<Settlement, PipelineError> {
        let response = proceed.run().await.inspect_err(|error| {
            tracing::debug!(error = %error, "Real network exchange failed");
        })?;

        if emitter.is_live() {
            self.gate.record(Tally::Bypassed);
        }
        metrics::counter!("interpose.requests.bypassed").increment(1);

        emitter
            .emit(LifeCycleEvent::ResponseBypass {
                response: response.clone(),
                request_id,
            })
            .await;
        Ok(Settlement::Network(response))
    }
}
