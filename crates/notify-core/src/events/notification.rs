//! Notification lifecycle events.

use serde::{Deserialize, Serialize};

use crate::types::{CourseKey, NotificationId, UserId};

/// Maximum number of recipient ids carried by a `Generated` event.
pub const GENERATED_EVENT_USER_LIMIT: usize = 100;

/// Events related to notification delivery and interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A fan-out call produced notifications.
    Generated {
        /// Course the notifications belong to.
        course_key: CourseKey,
        /// Owning app.
        app_name: String,
        /// Notification type.
        notification_type: String,
        /// First recipients (bounded).
        user_ids: Vec<UserId>,
        /// Whether `user_ids` was cut at the bound.
        truncated: bool,
        /// Total number of recipients.
        recipient_count: usize,
    },
    /// A notification transitioned from unread to read.
    Read {
        /// The reader.
        user_id: UserId,
        /// The notification.
        notification_id: NotificationId,
        /// Owning app.
        app_name: String,
        /// Notification type.
        notification_type: String,
        /// Always true; repeated reads emit nothing.
        first_read: bool,
    },
    /// Every notification of an app was marked read.
    AppAllRead {
        /// The reader.
        user_id: UserId,
        /// The app.
        app_name: String,
        /// Number of rows that changed.
        marked: u64,
    },
    /// Notifications of an app were marked seen.
    Seen {
        /// The viewer.
        user_id: UserId,
        /// The app.
        app_name: String,
    },
    /// The user opened the notification tray.
    TrayOpened {
        /// The viewer.
        user_id: UserId,
        /// Unseen notifications at the moment the tray opened.
        unseen_count: i64,
    },
    /// The one-click unsubscribe flow changed preferences.
    Unsubscribed {
        /// The user.
        user_id: UserId,
        /// App scope, `None` for all apps.
        app_name: Option<String>,
        /// Type scope, `None` for all types.
        notification_type: Option<String>,
        /// Channel scope, `None` for all channels.
        channel: Option<String>,
        /// New value.
        value: bool,
    },
    /// A single-notification email was sent.
    EmailSent {
        /// The recipient.
        user_id: UserId,
        /// Course of the notification.
        course_key: CourseKey,
        /// The notification.
        notification_id: NotificationId,
    },
    /// A digest email was sent.
    DigestSent {
        /// The recipient.
        user_id: UserId,
        /// `Immediately` for buffered digests, otherwise the cadence.
        cadence: String,
        /// Notifications included.
        notification_count: usize,
    },
}

impl NotificationEvent {
    /// Short machine name used as the tracking event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generated { .. } => "notifications.generated",
            Self::Read { .. } => "notifications.read",
            Self::AppAllRead { .. } => "notifications.app_all_read",
            Self::Seen { .. } => "notifications.seen",
            Self::TrayOpened { .. } => "notifications.tray_opened",
            Self::Unsubscribed { .. } => "notifications.preferences.one_click_unsubscribe",
            Self::EmailSent { .. } => "notifications.email_sent",
            Self::DigestSent { .. } => "notifications.digest_sent",
        }
    }

    /// Build a `Generated` event, keeping only the first recipients.
    pub fn generated(
        course_key: CourseKey,
        app_name: &str,
        notification_type: &str,
        recipients: &[UserId],
    ) -> Self {
        let truncated = recipients.len() > GENERATED_EVENT_USER_LIMIT;
        Self::Generated {
            course_key,
            app_name: app_name.to_string(),
            notification_type: notification_type.to_string(),
            user_ids: recipients
                .iter()
                .take(GENERATED_EVENT_USER_LIMIT)
                .copied()
                .collect(),
            truncated,
            recipient_count: recipients.len(),
        }
    }
}
