//! In-process event bus for life-cycle events.
//!
//! The bus keeps an ordered list of subscriber records per [`EventName`].
//! Publishing an event awaits every listener subscribed to that name, one
//! after the other, in registration order. The next listener is not invoked
//! until the previous one has completed, so side effects observed by
//! subscribers are deterministically ordered.
//!
//! # Dispatch Semantics
//!
//! - Publish order equals call order
//! - Dispatch iterates a snapshot taken when publishing starts: a listener
//!   added while an event is being dispatched does not receive that event
//! - Subscribing or unsubscribing from inside a listener is allowed and
//!   never corrupts the in-progress iteration
//! - A panicking listener is logged and skipped; the remaining listeners
//!   still run
//!
//! # Example
//!
//! ```
//! use interpose_core::EventName;
//! use interpose_runtime::event_bus::EventBus;
//!
//! let bus = EventBus::new();
//! let subscription = bus.on(EventName::RequestStart, |event| async move {
//!     println!("started {}", event.request_id());
//! });
//!
//! assert_eq!(bus.listener_count(EventName::RequestStart), 1);
//! subscription.unsubscribe();
//! assert_eq!(bus.listener_count(EventName::RequestStart), 0);
//! ```

use futures::FutureExt;
use interpose_core::{EventName, LifeCycleEvent};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Boxed future returned by [`Listener::on_event`].
pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A life-cycle event subscriber.
///
/// Implemented for every `Fn(LifeCycleEvent) -> impl Future<Output = ()>`
/// closure. Each listener receives its own clone of the event.
pub trait Listener: Send + Sync {
    /// Handle one event. The bus awaits the returned future before
    /// dispatching to the next listener.
    fn on_event(&self, event: LifeCycleEvent) -> ListenerFuture;
}

impl<F, Fut> Listener for F
where
    F: Fn(LifeCycleEvent) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn on_event(&self, event: LifeCycleEvent) -> ListenerFuture {
        Box::pin(self(event))
    }
}

struct SubscriberRecord {
    id: u64,
    listener: Arc<dyn Listener>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<EventName, Vec<SubscriberRecord>>>,
}

impl Registry {
    fn with_subscribers<T>(
        &self,
        f: impl FnOnce(&mut HashMap<EventName, Vec<SubscriberRecord>>) -> T,
    ) -> T {
        let mut guard = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn remove(&self, name: EventName, id: u64) -> bool {
        self.with_subscribers(|subscribers| {
            let Some(records) = subscribers.get_mut(&name) else {
                return false;
            };
            let before = records.len();
            records.retain(|record| record.id != id);
            before != records.len()
        })
    }
}

/// Ordered publish/subscribe channel keyed by event name.
///
/// Cloning is cheap and every clone shares the same subscriber lists.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to events named `name`.
    ///
    /// Returns a [`Subscription`] token that removes exactly this listener
    /// when [`unsubscribed`](Subscription::unsubscribe). Dropping the token
    /// keeps the listener subscribed.
    pub fn subscribe<L>(&self, name: EventName, listener: L) -> Subscription
    where
        L: Listener + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.with_subscribers(|subscribers| {
            subscribers.entry(name).or_default().push(SubscriberRecord {
                id,
                listener: Arc::new(listener),
            });
        });
        tracing::trace!(event = %name, subscriber = id, "Listener subscribed");

        Subscription {
            id,
            name,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Closure form of [`subscribe`](Self::subscribe).
    pub fn on<F, Fut>(&self, name: EventName, listener: F) -> Subscription
    where
        F: Fn(LifeCycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(name, listener)
    }

    /// Publish `event` to every listener subscribed to its name.
    ///
    /// Listeners are awaited one by one, in registration order.
    pub async fn publish(&self, event: &LifeCycleEvent) {
        self.publish_while(event, &|| true).await;
    }

    /// Publish `event`, checking `open` before each listener is invoked.
    ///
    /// Dispatch stops as soon as `open` returns `false`; listeners that were
    /// not reached do not see the event. Returns `true` if every listener in
    /// the snapshot was invoked.
    pub async fn publish_while(&self, event: &LifeCycleEvent, open: &(dyn Fn() -> bool + Sync)) -> bool {
        let name = event.name();
        let listeners: Vec<(u64, Arc<dyn Listener>)> = self.registry.with_subscribers(|subscribers| {
            subscribers
                .get(&name)
                .map(|records| {
                    records
                        .iter()
                        .map(|record| (record.id, Arc::clone(&record.listener)))
                        .collect()
                })
                .unwrap_or_default()
        });

        metrics::counter!("interpose.events.published", "event" => name.as_str()).increment(1);
        tracing::trace!(
            event = %name,
            request_id = %event.request_id(),
            listeners = listeners.len(),
            "Publishing event"
        );

        for (id, listener) in listeners {
            if !open() {
                tracing::trace!(event = %name, "Dispatch stopped: bus closed for this request");
                return false;
            }

            let invoked = std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event.clone())));
            let completed = match invoked {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await.is_ok(),
                Err(_) => false,
            };

            if !completed {
                metrics::counter!("interpose.listeners.panicked").increment(1);
                tracing::error!(
                    event = %name,
                    subscriber = id,
                    request_id = %event.request_id(),
                    "Listener panicked; continuing with remaining listeners"
                );
            }
        }

        true
    }

    /// Remove every listener for every event name.
    pub fn unsubscribe_all(&self) {
        let removed = self.registry.with_subscribers(|subscribers| {
            let count = subscribers.values().map(Vec::len).sum::<usize>();
            subscribers.clear();
            count
        });
        tracing::debug!(removed, "Removed all listeners");
    }

    /// Alias of [`unsubscribe_all`](Self::unsubscribe_all).
    pub fn remove_all_listeners(&self) {
        self.unsubscribe_all();
    }

    /// Number of listeners currently subscribed to `name`.
    #[must_use]
    pub fn listener_count(&self, name: EventName) -> usize {
        self.registry
            .with_subscribers(|subscribers| subscribers.get(&name).map_or(0, Vec::len))
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(EventName, usize)> = EventName::ALL
            .into_iter()
            .map(|name| (name, self.listener_count(name)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

/// Cancellation token for one listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    name: EventName,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Event name this subscription listens to.
    #[must_use]
    pub const fn event_name(&self) -> EventName {
        self.name
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry.with_subscribers(|subscribers| {
                subscribers
                    .get(&self.name)
                    .is_some_and(|records| records.iter().any(|record| record.id == self.id))
            })
        })
    }

    /// Remove the listener. Returns `false` if it was already removed.
    #[allow(clippy::needless_pass_by_value)] // consuming the token is the point
    pub fn unsubscribe(self) -> bool {
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.name, self.id));
        tracing::trace!(event = %self.name, subscriber = self.id, removed, "Listener unsubscribed");
        removed
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
