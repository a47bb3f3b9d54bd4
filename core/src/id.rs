//! Request identifiers.
//!
//! A [`RequestId`] is a correlation token: it is generated once per captured
//! request and attached to every life-cycle event for that request. It has
//! no meaning beyond equality.
//!
//! Generation is abstracted behind [`IdGenerator`] so tests can inject
//! predictable identifiers (see `SequentialIdGenerator` in the testing crate)
//! while production code uses [`RandomIdGenerator`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque per-request correlation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Wrap an existing identifier string.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Source of unique request identifiers.
///
/// Implementations must never return the same identifier twice within the
/// lifetime of one server session. Generation never fails.
pub trait IdGenerator: Send + Sync {
    /// Produce the next identifier.
    fn next_id(&self) -> RequestId;
}

/// Random UUID v4 identifiers rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::from(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Arc<G> {
    fn next_id(&self) -> RequestId {
        (**self).next_id()
    }
}
