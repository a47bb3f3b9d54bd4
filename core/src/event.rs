//! Life-cycle events emitted by the request pipeline.
//!
//! Every request that enters the pipeline while it is active produces an
//! ordered sequence of events, all carrying the same [`RequestId`]:
//!
//! ```text
//! mocked:        request:start → request:match     → request:end → response:mocked
//! no handler:    request:start → request:unhandled → request:end → response:bypass
//! passthrough:   request:start →                     request:end → response:bypass
//! resolver err:  request:start → unhandledException → request:end → response:bypass
//! ```
//!
//! Event names are fixed strings, exposed through [`EventName`] so that
//! subscribers never match on raw text.

use crate::handler::ResolverError;
use crate::id::RequestId;
use crate::request::CapturedRequest;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when parsing an unknown event name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown life-cycle event name: {0}")]
pub struct EventNameError(pub String);

/// Name of a life-cycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventName {
    /// `request:start`
    #[serde(rename = "request:start")]
    RequestStart,
    /// `request:match`
    #[serde(rename = "request:match")]
    RequestMatch,
    /// `request:unhandled`
    #[serde(rename = "request:unhandled")]
    RequestUnhandled,
    /// `request:end`
    #[serde(rename = "request:end")]
    RequestEnd,
    /// `response:mocked`
    #[serde(rename = "response:mocked")]
    ResponseMocked,
    /// `response:bypass`
    #[serde(rename = "response:bypass")]
    ResponseBypass,
    /// `unhandledException`
    #[serde(rename = "unhandledException")]
    UnhandledException,
}

impl EventName {
    /// Every event name, in life-cycle order.
    pub const ALL: [Self; 7] = [
        Self::RequestStart,
        Self::RequestMatch,
        Self::RequestUnhandled,
        Self::RequestEnd,
        Self::ResponseMocked,
        Self::ResponseBypass,
        Self::UnhandledException,
    ];

    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestStart => "request:start",
            Self::RequestMatch => "request:match",
            Self::RequestUnhandled => "request:unhandled",
            Self::RequestEnd => "request:end",
            Self::ResponseMocked => "response:mocked",
            Self::ResponseBypass => "response:bypass",
            Self::UnhandledException => "unhandledException",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = EventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EventNameError(s.to_string()))
    }
}

/// A life-cycle notification for one request.
#[derive(Debug, Clone)]
pub enum LifeCycleEvent {
    /// The request entered the pipeline.
    RequestStart {
        /// Request snapshot
        request: CapturedRequest,
        /// Correlation id
        request_id: RequestId,
    },

    /// A handler produced a mocked response for the request.
    RequestMatch {
        /// Request snapshot
        request: CapturedRequest,
        /// Correlation id
        request_id: RequestId,
    },

    /// No handler matched the request.
    RequestUnhandled {
        /// Request snapshot
        request: CapturedRequest,
        /// Correlation id
        request_id: RequestId,
    },

    /// The pipeline finished deciding the request's disposition.
    RequestEnd {
        /// Request snapshot
        request: CapturedRequest,
        /// Correlation id
        request_id: RequestId,
    },

    /// The mocked response was handed back to the caller.
    ResponseMocked {
        /// Synthetic response
        response: Response,
        /// Correlation id
        request_id: RequestId,
    },

    /// The real network exchange completed.
    ResponseBypass {
        /// Real response
        response: Response,
        /// Correlation id
        request_id: RequestId,
    },

    /// A resolver failed while handling the request.
    UnhandledException {
        /// Captured resolver error
        error: ResolverError,
        /// Request snapshot
        request: CapturedRequest,
        /// Correlation id
        request_id: RequestId,
    },
}

impl LifeCycleEvent {
    /// Name of this event.
    #[must_use]
    pub const fn name(&self) -> EventName {
        match self {
            Self::RequestStart { .. } => EventName::RequestStart,
            Self::RequestMatch { .. } => EventName::RequestMatch,
            Self::RequestUnhandled { .. } => EventName::RequestUnhandled,
            Self::RequestEnd { .. } => EventName::RequestEnd,
            Self::ResponseMocked { .. } => EventName::ResponseMocked,
            Self::ResponseBypass { .. } => EventName::ResponseBypass,
            Self::UnhandledException { .. } => EventName::UnhandledException,
        }
    }

    /// Correlation id of the request this event belongs to.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        match self {
            Self::RequestStart { request_id, .. }
            | Self::RequestMatch { request_id, .. }
            | Self::RequestUnhandled { request_id, .. }
            | Self::RequestEnd { request_id, .. }
            | Self::ResponseMocked { request_id, .. }
            | Self::ResponseBypass { request_id, .. }
            | Self::UnhandledException { request_id, .. } => request_id,
        }
    }

    /// Request snapshot, for events that carry one.
    #[must_use]
    pub const fn request(&self) -> Option<&CapturedRequest> {
        match self {
            Self::RequestStart { request, .. }
            | Self::RequestMatch { request, .. }
            | Self::RequestUnhandled { request, .. }
            | Self::RequestEnd { request, .. }
            | Self::UnhandledException { request, .. } => Some(request),
            Self::ResponseMocked { .. } | Self::ResponseBypass { .. } => None,
        }
    }

    /// Response, for `response:*` events.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::ResponseMocked { response, .. } | Self::ResponseBypass { response, .. } => {
                Some(response)
            },
            _ => None,
        }
    }

    /// Resolver error, for `unhandledException`.
    #[must_use]
    pub const fn error(&self) -> Option<&ResolverError> {
        match self {
            Self::UnhandledException { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn names_round_trip_through_strings() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
        }
        assert!("request:begin".parse::<EventName>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&EventName::UnhandledException).unwrap();
        assert_eq!(json, r#""unhandledException""#);
        let parsed: EventName = serde_json::from_str(r#""response:bypass""#).unwrap();
        assert_eq!(parsed, EventName::ResponseBypass);
    }

    #[test]
    fn accessors_expose_payload() {
        let request = CapturedRequest::builder(Method::GET, "http://a.test/")
            .build()
            .unwrap();
        let event = LifeCycleEvent::UnhandledException {
            error: ResolverError::new("boom"),
            request,
            request_id: RequestId::from("req-1"),
        };

        assert_eq!(event.name(), EventName::UnhandledException);
        assert_eq!(event.request_id().as_str(), "req-1");
        assert_eq!(event.error().unwrap().message(), "boom");
        assert!(event.request().is_some());
        assert!(event.response().is_none());
    }
}
