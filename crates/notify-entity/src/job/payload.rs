//! Typed job payload definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notify_core::types::{CourseKey, UserId};

use super::status::JobPriority;
use crate::notification::DeleteFilter;
use crate::preference::EmailCadence;

/// Job type of [`JobPayload::SendDigest`].
pub const SEND_DIGEST: &str = "send_digest";
/// Job type of [`JobPayload::SendBufferedDigest`].
pub const SEND_BUFFERED_DIGEST: &str = "send_buffered_digest";
/// Job type of [`JobPayload::DeleteExpiredNotifications`].
pub const DELETE_EXPIRED_NOTIFICATIONS: &str = "delete_expired_notifications";
/// Job type of [`JobPayload::DeleteNotifications`].
pub const DELETE_NOTIFICATIONS: &str = "delete_notifications";

/// Typed payloads for known job types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum JobPayload {
    /// Send the daily or weekly digest to every eligible user.
    #[serde(rename = "send_digest")]
    SendDigest {
        /// `Daily` or `Weekly`.
        cadence: EmailCadence,
    },
    /// Send one buffered digest for a (user, course) window.
    #[serde(rename = "send_buffered_digest")]
    SendBufferedDigest {
        /// Recipient.
        user_id: UserId,
        /// Course of the window.
        course_key: CourseKey,
        /// Start of the window (the last immediate email).
        start_date: DateTime<Utc>,
        /// Recipient language for rendering.
        user_language: String,
    },
    /// Delete notifications past the retention window.
    #[serde(rename = "delete_expired_notifications")]
    DeleteExpiredNotifications,
    /// Operator bulk delete.
    #[serde(rename = "delete_notifications")]
    DeleteNotifications {
        /// Selection filter.
        filter: DeleteFilter,
    },
}

impl JobPayload {
    /// The job type string stored on the row.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::SendDigest { .. } => SEND_DIGEST,
            Self::SendBufferedDigest { .. } => SEND_BUFFERED_DIGEST,
            Self::DeleteExpiredNotifications => DELETE_EXPIRED_NOTIFICATIONS,
            Self::DeleteNotifications { .. } => DELETE_NOTIFICATIONS,
        }
    }

    /// Queue the job is placed on.
    pub fn queue(&self) -> &'static str {
        match self {
            Self::SendDigest { .. } | Self::SendBufferedDigest { .. } => "email",
            Self::DeleteExpiredNotifications | Self::DeleteNotifications { .. } => "maintenance",
        }
    }

    /// Default priority.
    pub fn priority(&self) -> JobPriority {
        match self {
            Self::SendBufferedDigest { .. } => JobPriority::High,
            Self::SendDigest { .. } => JobPriority::Normal,
            Self::DeleteExpiredNotifications | Self::DeleteNotifications { .. } => JobPriority::Low,
        }
    }
}
