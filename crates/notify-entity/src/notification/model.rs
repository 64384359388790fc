//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notify_core::types::{CourseKey, NotificationId, UserId};

/// Template context attached to a notification.
pub type ContentContext = serde_json::Map<String, serde_json::Value>;

/// An in-app notification delivered to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Monotonic identifier.
    pub id: NotificationId,
    /// The recipient.
    pub user_id: UserId,
    /// Course the notification belongs to, if any.
    pub course_id: Option<CourseKey>,
    /// Owning app (e.g. `discussion`).
    pub app_name: String,
    /// Notification type (e.g. `new_response`).
    pub notification_type: String,
    /// Template context (JSON object).
    pub content_context: serde_json::Value,
    /// Link opened when the notification is clicked.
    pub content_url: Option<String>,
    /// Visible in the tray.
    pub web: bool,
    /// Eligible for email delivery.
    pub email: bool,
    /// When the user read the notification.
    pub last_read: Option<DateTime<Utc>>,
    /// When the user last saw the notification in the tray.
    pub last_seen: Option<DateTime<Utc>>,
    /// Grouping key; empty when the producer supplied none.
    pub group_by_id: String,
    /// When an email including this notification was sent.
    pub email_sent_on: Option<DateTime<Utc>>,
    /// Waiting for a buffered digest.
    pub email_scheduled: bool,
    /// Creation time, refreshed when the notification is regrouped.
    pub created: DateTime<Utc>,
    /// Rendered email body cache.
    pub email_content: Option<String>,
}

impl Notification {
    /// Check if the notification has not been read.
    pub fn is_unread(&self) -> bool {
        self.last_read.is_none()
    }

    /// Check if the notification has not been seen.
    pub fn is_unseen(&self) -> bool {
        self.last_seen.is_none()
    }

    /// Check if the notification is older than the retention cutoff.
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.created <= cutoff
    }

    /// Return the context as an object, or an empty map if it is not one.
    pub fn context(&self) -> ContentContext {
        match &self.content_context {
            serde_json::Value::Object(map) => map.clone(),
            _ => ContentContext::new(),
        }
    }

    /// Look up a context value as text.
    pub fn context_str(&self, key: &str) -> Option<String> {
        match self.content_context.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Data required to insert a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// The recipient.
    pub user_id: UserId,
    /// Course the notification belongs to.
    pub course_id: Option<CourseKey>,
    /// Owning app.
    pub app_name: String,
    /// Notification type.
    pub notification_type: String,
    /// Template context.
    pub content_context: ContentContext,
    /// Link target.
    pub content_url: Option<String>,
    /// Visible in the tray.
    pub web: bool,
    /// Eligible for email delivery.
    pub email: bool,
    /// Grouping key.
    pub group_by_id: String,
    /// Creation time.
    pub created: DateTime<Utc>,
}
