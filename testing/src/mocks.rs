//! Mock implementations for testing.

use interpose_core::{IdGenerator, NetworkError, Proceed, RequestId, Response, StatusCode};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Predictable request ids: `req-1`, `req-2`, ...
///
/// # Example
///
/// ```
/// use interpose_core::IdGenerator;
/// use interpose_testing::SequentialIdGenerator;
///
/// let ids = SequentialIdGenerator::new();
/// assert_eq!(ids.next_id().as_str(), "req-1");
/// assert_eq!(ids.next_id().as_str(), "req-2");
/// ```
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start counting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> RequestId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        RequestId::from(format!("req-{n}"))
    }
}

/// Scripted stand-in for the real network.
///
/// Every [`proceed`](Self::proceed) capability it hands out answers with the
/// scripted reply and bumps a shared call counter, so tests can assert
/// whether the pipeline reached the network.
#[derive(Debug, Clone)]
pub struct FakeNetwork {
    calls: Arc<AtomicUsize>,
    reply: Arc<Result<Response, NetworkError>>,
    latency: Option<Duration>,
}

impl FakeNetwork {
    /// Answer `200 OK` with the body `real`.
    #[must_use]
    pub fn new() -> Self {
        Self::replying(Response::text(StatusCode::OK, "real"))
    }

    /// Answer every exchange with `response`.
    #[must_use]
    pub fn replying(response: Response) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            reply: Arc::new(Ok(response)),
            latency: None,
        }
    }

    /// Fail every exchange with `error`.
    #[must_use]
    pub fn failing(error: NetworkError) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            reply: Arc::new(Err(error)),
            latency: None,
        }
    }

    /// Sleep for `latency` before answering.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// A one-shot capability backed by this network.
    #[must_use]
    pub fn proceed(&self) -> Proceed {
        let calls = Arc::clone(&self.calls);
        let reply = Arc::clone(&self.reply);
        let latency = self.latency;
        Proceed::new(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            (*reply).clone()
        })
    }

    /// Number of exchanges performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::new()
    }
}
