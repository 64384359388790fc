//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::NotificationId;
use notify_entity::preference::PreferenceUpdate;
use notify_service::preference::parse_update;

/// Body of `PATCH /configurations/{course_id}` and `POST /preferences/update-all`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PreferencePatchRequest {
    /// App name.
    #[validate(length(min = 1, message = "notification_app is required"))]
    pub notification_app: String,
    /// Type name or `core`.
    #[validate(length(min = 1, message = "notification_type is required"))]
    pub notification_type: String,
    /// `web`, `email`, `push` or `email_cadence`.
    #[validate(length(min = 1, message = "notification_channel is required"))]
    pub notification_channel: String,
    /// Boolean for channels, cadence literal for `email_cadence`.
    pub value: serde_json::Value,
    /// Version the client read; a mismatch is rejected.
    #[serde(default)]
    pub config_version: Option<i32>,
}

impl PreferencePatchRequest {
    /// Validate and convert into a typed update.
    pub fn into_update(&self) -> AppResult<PreferenceUpdate> {
        validate(self)?;
        parse_update(
            &self.notification_app,
            &self.notification_type,
            &self.notification_channel,
            &self.value,
        )
    }
}

/// Body of `PATCH /notifications/read`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkReadRequest {
    /// One notification; takes priority over `app_name`.
    #[serde(default)]
    pub notification_id: Option<NotificationId>,
    /// Every notification of an app.
    #[serde(default)]
    pub app_name: Option<String>,
}

/// Query of `GET /notifications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationListQuery {
    /// Restrict to one app.
    #[serde(default)]
    pub app_name: Option<String>,
    /// Present when the tray was opened by the user.
    #[serde(default)]
    pub tray_opened: Option<String>,
}

impl NotificationListQuery {
    /// Whether the tray-opened flag is set.
    pub fn tray_opened(&self) -> bool {
        self.tray_opened
            .as_deref()
            .is_some_and(|v| !matches!(v, "" | "0" | "false" | "False"))
    }
}

/// Run `validator` rules and map failures to a validation error.
pub fn validate<T: Validate>(value: &T) -> AppResult<()> {
    value
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))
}
