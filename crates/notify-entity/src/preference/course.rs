//! Per-course preference row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notify_core::types::{CourseKey, UserId};

use super::config::PreferenceConfig;

/// A user's notification configuration for one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CoursePreference {
    /// Row identifier.
    pub id: i64,
    /// The user.
    pub user_id: UserId,
    /// The course.
    pub course_id: CourseKey,
    /// Stored configuration document.
    pub notification_preference_config: serde_json::Value,
    /// Schema version the document was written against.
    pub config_version: i32,
    /// Soft-delete flag (unenrollment).
    pub is_active: bool,
    /// When the row was created.
    pub created: DateTime<Utc>,
    /// When the row was last modified.
    pub modified: DateTime<Utc>,
}

impl CoursePreference {
    /// Decode the stored configuration.
    pub fn config(&self) -> Result<PreferenceConfig, serde_json::Error> {
        PreferenceConfig::from_value(&self.notification_preference_config)
    }
}

/// A migrated config to persist if the row is still at `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMigration {
    /// Row identifier.
    pub id: i64,
    /// Version the migration was computed from.
    pub expected_version: i32,
    /// Migrated document.
    pub config: serde_json::Value,
}
