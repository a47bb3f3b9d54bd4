//! Ordered handler sequence with atomic swaps.
//!
//! Readers take an `Arc` snapshot of the whole sequence, so a request that
//! is being matched never observes a half-applied `use_handlers` or
//! `reset_handlers`. Writers replace the snapshot under a short write lock.

use interpose_core::Handler;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared, immutable view of the handler sequence.
pub type HandlerSnapshot = Arc<Vec<Arc<Handler>>>;

/// The initial handlers plus the current (possibly overridden) sequence.
#[derive(Debug)]
pub struct HandlerRegistry {
    initial: HandlerSnapshot,
    current: RwLock<HandlerSnapshot>,
}

impl HandlerRegistry {
    /// Create a registry whose initial and current sequences are `handlers`.
    #[must_use]
    pub fn new(handlers: impl IntoIterator<Item = Handler>) -> Self {
        let initial: HandlerSnapshot = Arc::new(handlers.into_iter().map(Arc::new).collect());
        Self {
            current: RwLock::new(Arc::clone(&initial)),
            initial,
        }
    }

    /// The current sequence.
    #[must_use]
    pub fn snapshot(&self) -> HandlerSnapshot {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Prepend runtime overrides; they take precedence over everything
    /// already registered.
    pub fn prepend(&self, handlers: impl IntoIterator<Item = Handler>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<Handler>> = handlers.into_iter().map(Arc::new).collect();
        let added = next.len();
        next.extend(current.iter().cloned());
        *current = Arc::new(next);
        tracing::debug!(added, total = current.len(), "Prepended handlers");
    }

    /// Drop runtime overrides.
    ///
    /// With `Some(handlers)` the current sequence becomes exactly
    /// `handlers`; with `None` it returns to the initial sequence.
    pub fn reset(&self, next: Option<Vec<Handler>>) {
        let replacement = match next {
            Some(handlers) => Arc::new(handlers.into_iter().map(Arc::new).collect()),
            None => Arc::clone(&self.initial),
        };
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = replacement;
        tracing::debug!(total = current.len(), "Reset handlers");
    }

    /// Make every used one-shot handler in the current sequence eligible
    /// again.
    pub fn restore(&self) {
        let snapshot = self.snapshot();
        for handler in snapshot.iter() {
            handler.restore();
        }
        tracing::debug!(total = snapshot.len(), "Restored one-shot handlers");
    }

    /// The current sequence as an owned list.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Handler>> {
        self.snapshot().iter().cloned().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
