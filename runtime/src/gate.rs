//! Active-state gate and per-session counters.
//!
//! The gate answers one question for the pipeline: is interception on, and
//! is it still the same listening session this request started in?
//!
//! Every call to [`ActiveGate::activate`] opens a new session identified by
//! a monotonically increasing epoch. A request entering the pipeline takes a
//! [`SessionToken`] for the current session. A token only stays valid until
//! the gate is closed, even if the gate is re-opened afterwards, so requests
//! still in flight when `close()` is called cannot leak events into a later
//! session.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Identifies the listening session a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Session epoch, starting at 1 for the first `activate()`.
    #[must_use]
    pub const fn epoch(self) -> u64 {
        self.0
    }
}

/// Counters for the current listening session.
///
/// Reset every time the gate is activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Requests that entered the pipeline while it was active
    pub requests: u64,
    /// Requests answered with a mocked response
    pub mocked: u64,
    /// Requests forwarded to the real network
    pub bypassed: u64,
    /// Requests no handler matched
    pub unhandled: u64,
    /// Resolver failures (errors and panics)
    pub exceptions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    mocked: AtomicU64,
    bypassed: AtomicU64,
    unhandled: AtomicU64,
    exceptions: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.requests,
            &self.mocked,
            &self.bypassed,
            &self.unhandled,
            &self.exceptions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            requests: self.requests.load(Ordering::Relaxed),
            mocked: self.mocked.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
        }
    }
}

/// Kind of occurrence counted in [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    /// A request entered the pipeline
    Request,
    /// A mocked response was returned
    Mocked,
    /// The real network was used
    Bypassed,
    /// No handler matched
    Unhandled,
    /// A resolver failed
    Exception,
}

/// Shared on/off switch of the pipeline.
#[derive(Debug, Default)]
pub struct ActiveGate {
    active: AtomicBool,
    epoch: AtomicU64,
    counters: Counters,
}

impl ActiveGate {
    /// Create a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session and reset the session counters.
    ///
    /// Calling this while already active starts a fresh session; requests
    /// holding the previous token are abandoned.
    pub fn activate(&self) -> SessionToken {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.reset();
        self.active.store(true, Ordering::SeqCst);
        SessionToken(epoch)
    }

    /// Close the gate. Returns `true` if it was open.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Whether interception is on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Token for the current session, or `None` when closed.
    #[must_use]
    pub fn session(&self) -> Option<SessionToken> {
        self.is_active()
            .then(|| SessionToken(self.epoch.load(Ordering::SeqCst)))
    }

    /// Whether `token` still belongs to the open session.
    #[must_use]
    pub fn is_current(&self, token: SessionToken) -> bool {
        self.is_active() && self.epoch.load(Ordering::SeqCst) == token.0
    }

    /// Count one occurrence in the session counters.
    pub fn record(&self, tally: Tally) {
        let counter = match tally {
            Tally::Request => &self.counters.requests,
            Tally::Mocked => &self.counters.mocked,
            Tally::Bypassed => &self.counters.bypassed,
            Tally::Unhandled => &self.counters.unhandled,
            Tally::Exception => &self.counters.exceptions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters of the current (or last) session.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }
}
