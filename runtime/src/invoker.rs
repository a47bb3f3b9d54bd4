//! Panic-safe resolver invocation.
//!
//! Resolvers are user code. Whatever they do (return a response, decline,
//! return an error, or panic while building or polling their future) the
//! invoker turns it into a [`ResolutionOutcome`] value. Nothing a resolver
//! does can unwind into the pipeline.

use futures::FutureExt;
use interpose_core::{CapturedRequest, Handler, ResolutionOutcome, ResolverError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Run `handler`'s resolver against `request` and normalize the result.
pub async fn invoke(handler: &Handler, request: CapturedRequest) -> ResolutionOutcome {
    let start = Instant::now();

    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.resolve(request))) {
        Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => ResolutionOutcome::from(result),
            Err(payload) => panicked(payload.as_ref()),
        },
        Err(payload) => panicked(payload.as_ref()),
    };

    let elapsed = start.elapsed();
    metrics::histogram!("interpose.resolver.duration_seconds").record(elapsed.as_secs_f64());
    tracing::trace!(
        handler = %handler,
        outcome = outcome.label(),
        elapsed_ms = elapsed.as_millis(),
        "Resolver finished"
    );

    outcome
}

fn panicked(payload: &(dyn Any + Send)) -> ResolutionOutcome {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "resolver panicked".to_string());
    ResolutionOutcome::ResolverError(ResolverError::panicked(message))
}
