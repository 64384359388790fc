//! Query filters over the notification table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::CourseKey;

/// Widest `created` window accepted by an operator bulk delete.
pub const MAX_DELETE_WINDOW_DAYS: i64 = 15;

/// Filter for the tray listing.
#[derive(Debug, Clone)]
pub struct ListFilter {
    /// Restrict to one app.
    pub app_name: Option<String>,
    /// Notifications created at or before this instant are hidden.
    pub expiry_cutoff: DateTime<Utc>,
}

/// Inclusive bounds on `created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRange {
    /// Lower bound (`created >= gte`).
    pub gte: DateTime<Utc>,
    /// Upper bound (`created <= lte`).
    pub lte: DateTime<Utc>,
}

/// Filter for operator-invoked bulk deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFilter {
    /// Restrict to one app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Restrict to one type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Restrict to one course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseKey>,
    /// Creation window; always required.
    pub created: CreatedRange,
}

impl DeleteFilter {
    /// Reject inverted windows and windows wider than the operator cap.
    pub fn validate(&self) -> AppResult<()> {
        let CreatedRange { gte, lte } = self.created;
        if gte > lte {
            return Err(AppError::validation(
                "created.gte must not be later than created.lte",
            ));
        }
        if lte - gte > Duration::days(MAX_DELETE_WINDOW_DAYS) {
            return Err(AppError::validation(format!(
                "Deletion window may not exceed {MAX_DELETE_WINDOW_DAYS} days"
            )));
        }
        Ok(())
    }

    /// Check whether a notification matches this filter.
    pub fn matches(&self, notification: &super::Notification) -> bool {
        self.app_name
            .as_deref()
            .is_none_or(|app| app == notification.app_name)
            && self
                .notification_type
                .as_deref()
                .is_none_or(|t| t == notification.notification_type)
            && self
                .course_id
                .as_ref()
                .is_none_or(|c| notification.course_id.as_ref() == Some(c))
            && notification.created >= self.created.gte
            && notification.created <= self.created.lte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(days: i64) -> DeleteFilter {
        let lte = Utc::now();
        DeleteFilter {
            app_name: Some("discussion".to_string()),
            notification_type: None,
            course_id: None,
            created: CreatedRange {
                gte: lte - Duration::days(days),
                lte,
            },
        }
    }

    #[test]
    fn test_window_within_cap_is_valid() {
        assert!(filter(15).validate().is_ok());
    }

    #[test]
    fn test_window_over_cap_is_rejected() {
        let err = filter(16).validate().expect_err("too wide");
        assert_eq!(err.kind, notify_core::error::ErrorKind::Validation);
    }

    #[test]
    fn test_created_range_uses_dotted_wire_shape() {
        let json = serde_json::to_value(filter(1)).expect("serialize");
        assert!(json["created"]["gte"].is_string());
        assert!(json["created"]["lte"].is_string());
        assert!(json.get("notification_type").is_none());
    }
}
