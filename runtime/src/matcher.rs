//! First-match handler selection.

use interpose_core::{CapturedRequest, Handler};
use std::sync::Arc;

/// Find and claim the first handler, in sequence order, that accepts `request`.
///
/// One-shot handlers that are used, or claimed by a concurrent request, are
/// skipped. The caller must [`Handler::release`] the returned handler if it
/// does not end up delivering a mocked response.
/// Only the method and URL are inspected; resolvers are never invoked here.
#[must_use]
pub fn find_handler<'a>(
    request: &CapturedRequest,
    handlers: &'a [Arc<Handler>],
) -> Option<&'a Arc<Handler>> {
    handlers
        .iter()
        .find(|handler| handler.accepts(request.method(), request.url()) && handler.try_claim())
}
