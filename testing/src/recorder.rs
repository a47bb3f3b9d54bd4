//! Records every life-cycle event published on a bus.

use interpose_core::{EventName, LifeCycleEvent, RequestId};
use interpose_runtime::{EventBus, Subscription};
use std::sync::{Arc, Mutex, PoisonError};

/// Subscribes to every event name and keeps the events in publish order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<LifeCycleEvent>>>,
}

impl EventRecorder {
    /// Create a recorder subscribed to every event on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        recorder.subscribe(bus);
        recorder
    }

    /// Subscribe to every event name on `bus`.
    ///
    /// Returns one subscription per event name.
    pub fn subscribe(&self, bus: &EventBus) -> Vec<Subscription> {
        EventName::ALL
            .into_iter()
            .map(|name| {
                let events = Arc::clone(&self.events);
                bus.on(name, move |event| {
                    let events = Arc::clone(&events);
                    async move {
                        events
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(event);
                    }
                })
            })
            .collect()
    }

    /// All recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifeCycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of all recorded events.
    #[must_use]
    pub fn names(&self) -> Vec<EventName> {
        self.events().iter().map(LifeCycleEvent::name).collect()
    }

    /// Recorded events for one request.
    #[must_use]
    pub fn events_for(&self, request_id: &RequestId) -> Vec<LifeCycleEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.request_id() == request_id)
            .collect()
    }

    /// Names of the recorded events for one request.
    #[must_use]
    pub fn names_for(&self, request_id: &RequestId) -> Vec<EventName> {
        self.events_for(request_id)
            .iter()
            .map(LifeCycleEvent::name)
            .collect()
    }

    /// Distinct request ids, in order of first appearance.
    #[must_use]
    pub fn request_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = Vec::new();
        for event in self.events() {
            if !ids.contains(event.request_id()) {
                ids.push(event.request_id().clone());
            }
        }
        ids
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
