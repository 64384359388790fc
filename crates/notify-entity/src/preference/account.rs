//! Account-scoped preference rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notify_core::types::UserId;

use super::cadence::EmailCadence;
use super::config::TypePreference;

/// One `(user, app, type)` preference, independent of course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountPreference {
    /// Row identifier.
    pub id: i64,
    /// The user.
    pub user_id: UserId,
    /// Owning app.
    pub app: String,
    /// Notification type.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: String,
    /// In-app delivery.
    pub web: bool,
    /// Email delivery.
    pub email: bool,
    /// Push delivery.
    pub push: bool,
    /// Email cadence; never `Mixed`.
    pub email_cadence: EmailCadence,
    /// When the row was created.
    pub created: DateTime<Utc>,
    /// When the row was last modified.
    pub modified: DateTime<Utc>,
}

/// Values written by an account preference upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPreferenceValues {
    /// Owning app.
    pub app: String,
    /// Notification type.
    pub notification_type: String,
    /// In-app delivery.
    pub web: bool,
    /// Email delivery.
    pub email: bool,
    /// Push delivery.
    pub push: bool,
    /// Email cadence.
    pub email_cadence: EmailCadence,
}

impl AccountPreferenceValues {
    /// Build from a resolved type preference.
    pub fn from_type(app: &str, notification_type: &str, pref: &TypePreference) -> Self {
        Self {
            app: app.to_string(),
            notification_type: notification_type.to_string(),
            web: pref.web,
            email: pref.email,
            push: pref.push,
            email_cadence: pref.email_cadence,
        }
    }
}
