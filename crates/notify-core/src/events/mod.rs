//! Domain events emitted by notification operations.
//!
//! Events are published on the event bus after the state change they
//! describe has been committed, and consumed by tracking and logging sinks.

pub mod notification;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use notification::NotificationEvent;

/// Wrapper for all domain events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: NotificationEvent,
}

impl DomainEvent {
    /// Wrap a payload with a fresh id and timestamp.
    pub fn new(payload: NotificationEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp,
            payload,
        }
    }
}
