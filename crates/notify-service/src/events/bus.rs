//! Event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across services. Every
//! published event is also logged, so the tracking trail survives even when
//! no subscriber is attached.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use notify_core::events::{DomainEvent, NotificationEvent};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for [`DomainEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event stamped with the current time.
    pub fn publish(&self, payload: NotificationEvent) {
        self.publish_at(payload, Utc::now());
    }

    /// Publish an event stamped with `timestamp`.
    pub fn publish_at(&self, payload: NotificationEvent, timestamp: DateTime<Utc>) {
        let event = DomainEvent::new(payload, timestamp);
        info!(
            event_id = %event.id,
            event = event.payload.name(),
            payload = %serde_json::to_string(&event.payload).unwrap_or_default(),
            "Notification event"
        );
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
