//! Keyed publish/subscribe registry for queue events.
//!
//! Maps a topic (usually a queue name) to an ordered list of callbacks.
//! Delivery is synchronous and in subscription order. Subscriptions live
//! for the process only; there is no buffering, so a subscriber registered
//! after a publish never sees that publish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::event::QueueEvent;

/// A callback invoked with each event published on a topic.
pub type EventCallback = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: u64,
    topic: String,
}

impl SubscriptionHandle {
    /// The topic this handle is subscribed to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Topic-keyed callback registry.
#[derive(Default)]
pub struct NotificationBus {
    subscribers: Mutex<HashMap<String, Vec<(u64, EventCallback)>>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a topic.
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers
                .entry(topic.to_string())
                .or_default()
                .push((id, Arc::new(callback)));
        }

        SubscriptionHandle {
            id,
            topic: topic.to_string(),
        }
    }

    /// Remove a subscription.
    ///
    /// Unsubscribing a handle that is no longer registered is a no-op,
    /// but it is logged since it usually indicates a lifecycle bug.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };

        let removed = subscribers
            .get_mut(&handle.topic)
            .map(|callbacks| {
                let before = callbacks.len();
                callbacks.retain(|(id, _)| *id != handle.id);
                callbacks.len() < before
            })
            .unwrap_or(false);

        if !removed {
            warn!(topic = %handle.topic, "subscriber was not removed: callback does not exist");
        }
    }

    /// Deliver an event to every callback currently registered for the
    /// topic, in subscription order.
    ///
    /// The callback list is snapshotted before delivery, so subscribers
    /// added while callbacks run are not invoked for this publish.
    pub fn publish(&self, topic: &str, event: &QueueEvent) {
        let callbacks: Vec<EventCallback> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers
                .get(topic)
                .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of callbacks registered for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.get(topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::entry::SyncMeta;
    use std::sync::Arc;

    fn ended(queue: &str) -> QueueEvent {
        QueueEvent::SyncEnded {
            queue_name: queue.to_string(),
            meta: SyncMeta::started(0),
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe("default", move |_| {
                seen.lock().unwrap().push(label);
            });
        }

        bus.publish("default", &ended("default"));

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_publish_is_scoped_to_topic() {
        let bus = NotificationBus::new();
        let count = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&count);
        bus.subscribe("queue-a", move |_| *counter.lock().unwrap() += 1);

        bus.publish("queue-b", &ended("queue-b"));
        assert_eq!(*count.lock().unwrap(), 0);

        bus.publish("queue-a", &ended("queue-a"));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let count = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&count);
        let handle = bus.subscribe("default", move |_| *counter.lock().unwrap() += 1);

        bus.publish("default", &ended("default"));
        bus.unsubscribe(&handle);
        bus.publish("default", &ended("default"));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.subscriber_count("default"), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_handle_is_noop() {
        let bus = NotificationBus::new();
        let handle = bus.subscribe("default", |_| {});
        bus.unsubscribe(&handle);
        // Second unsubscribe finds nothing to remove
        bus.unsubscribe(&handle);
    }

    #[test]
    fn test_subscriber_added_during_publish_is_not_invoked() {
        let bus = Arc::new(NotificationBus::new());
        let late_calls = Arc::new(Mutex::new(0));

        let bus_inner = Arc::clone(&bus);
        let late_inner = Arc::clone(&late_calls);
        bus.subscribe("default", move |_| {
            let late = Arc::clone(&late_inner);
            bus_inner.subscribe("default", move |_| {
                *late.lock().unwrap() += 1;
            });
        });

        bus.publish("default", &ended("default"));
        assert_eq!(*late_calls.lock().unwrap(), 0);

        // The late subscriber sees the next publish
        bus.publish("default", &ended("default"));
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }
}
