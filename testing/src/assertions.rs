//! Canonical event sequences and life-cycle invariant checks.

use interpose_core::{EventName, LifeCycleEvent, RequestId};
use std::collections::HashMap;

/// `request:start → request:match → request:end → response:mocked`
pub const MOCKED: [EventName; 4] = [
    EventName::RequestStart,
    EventName::RequestMatch,
    EventName::RequestEnd,
    EventName::ResponseMocked,
];

/// `request:start → request:end → response:bypass`
pub const PASSTHROUGH: [EventName; 3] = [
    EventName::RequestStart,
    EventName::RequestEnd,
    EventName::ResponseBypass,
];

/// `request:start → request:unhandled → request:end → response:bypass`
pub const UNHANDLED: [EventName; 4] = [
    EventName::RequestStart,
    EventName::RequestUnhandled,
    EventName::RequestEnd,
    EventName::ResponseBypass,
];

/// `request:start → unhandledException → request:end → response:bypass`
pub const RESOLVER_ERROR: [EventName; 4] = [
    EventName::RequestStart,
    EventName::UnhandledException,
    EventName::RequestEnd,
    EventName::ResponseBypass,
];

/// Assert the exact event sequence of one request.
///
/// # Panics
///
/// Panics if the sequences differ.
#[allow(clippy::panic)] // Test assertion
pub fn assert_sequence(actual: &[EventName], expected: &[EventName]) {
    assert_eq!(
        actual, expected,
        "Expected life-cycle {expected:?}, but observed {actual:?}"
    );
}

/// Assert the ordering rules that hold for every request, whatever its
/// outcome:
///
/// - `request:start` is the first event of the request, exactly once
/// - at most one of `request:match` / `request:unhandled`
/// - at most one `request:end`, after start and before any `response:*`
/// - at most one `response:*`
///
/// Events of different requests may interleave freely.
///
/// # Panics
///
/// Panics on the first violated rule.
#[allow(clippy::panic)] // Test assertion
pub fn assert_lifecycle_invariants(events: &[LifeCycleEvent]) {
    let mut per_request: HashMap<&RequestId, Vec<EventName>> = HashMap::new();
    for event in events {
        per_request
            .entry(event.request_id())
            .or_default()
            .push(event.name());
    }

    for (id, names) in per_request {
        assert_eq!(
            names.first(),
            Some(&EventName::RequestStart),
            "{id}: first event must be request:start, got {names:?}"
        );
        let count = |name: EventName| names.iter().filter(|n| **n == name).count();
        let position = |name: EventName| names.iter().position(|n| *n == name);

        assert_eq!(count(EventName::RequestStart), 1, "{id}: duplicate start in {names:?}");
        assert!(
            count(EventName::RequestMatch) + count(EventName::RequestUnhandled) <= 1,
            "{id}: both match and unhandled in {names:?}"
        );
        assert!(count(EventName::RequestEnd) <= 1, "{id}: duplicate end in {names:?}");

        let responses = count(EventName::ResponseMocked) + count(EventName::ResponseBypass);
        assert!(responses <= 1, "{id}: more than one response event in {names:?}");

        if let Some(response_at) = position(EventName::ResponseMocked).or_else(|| position(EventName::ResponseBypass)) {
            let end_at = position(EventName::RequestEnd);
            assert!(
                end_at.is_some_and(|end| end < response_at),
                "{id}: request:end must precede the response event in {names:?}"
            );
        }
    }
}
