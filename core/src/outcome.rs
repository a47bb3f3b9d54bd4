//! Normalized result of running a request through matching and resolution.

use crate::handler::ResolverError;
use crate::response::Response;

/// What the pipeline decided for one request.
///
/// The resolver invoker only ever produces `Mocked`, `PassThroughExplicit`
/// or `ResolverError`; `Unhandled` is produced by the orchestrator when no
/// handler matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The resolver produced a synthetic response.
    Mocked(Response),

    /// The resolver ran and explicitly declined to produce a response.
    PassThroughExplicit,

    /// No handler matched the request.
    Unhandled,

    /// The resolver returned an error or panicked.
    ResolverError(ResolverError),
}

impl ResolutionOutcome {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Mocked(_) => "mocked",
            Self::PassThroughExplicit => "passthrough",
            Self::Unhandled => "unhandled",
            Self::ResolverError(_) => "error",
        }
    }

    /// Whether a mocked response was produced.
    #[must_use]
    pub const fn is_mocked(&self) -> bool {
        matches!(self, Self::Mocked(_))
    }

    /// Whether the request ends up on the real network under default policy.
    #[must_use]
    pub const fn reaches_network(&self) -> bool {
        !self.is_mocked()
    }
}

impl From<Result<Option<Response>, ResolverError>> for ResolutionOutcome {
    fn from(result: Result<Option<Response>, ResolverError>) -> Self {
        match result {
            Ok(Some(response)) => Self::Mocked(response),
            Ok(None) => Self::PassThroughExplicit,
            Err(error) => Self::ResolverError(error),
        }
    }
}
