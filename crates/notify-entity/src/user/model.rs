//! User and course lookup models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notify_core::types::{CourseKey, UserId};

/// The subset of a platform user the notification core needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// `false` for accounts with a disabled password.
    pub has_usable_password: bool,
    /// Preferred language (e.g. `en`).
    pub language: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Whether the user may receive email.
    pub fn can_receive_email(&self) -> bool {
        self.is_active && self.has_usable_password && !self.email.is_empty()
    }

    /// Preferred language, defaulting to English.
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or("en")
    }
}

/// Display metadata of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseSummary {
    /// Course key.
    pub course_id: CourseKey,
    /// Human-readable name.
    pub display_name: String,
}
