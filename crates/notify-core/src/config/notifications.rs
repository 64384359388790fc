//! Notification delivery settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-key override values for one schema entry (app or type).
pub type OverrideValues = BTreeMap<String, serde_json::Value>;

/// Settings that govern fan-out, buffering, retention and the schema overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Master switch for in-app notifications.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Master switch for notification emails.
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    /// Courses for which notifications and emails are switched off.
    #[serde(default)]
    pub disabled_courses: Vec<String>,
    /// Whether the notification tray is shown to users.
    #[serde(default = "default_true")]
    pub show_tray: bool,
    /// Retention window for notifications, in days.
    #[serde(default = "default_expiry_days")]
    pub notification_expiry_days: u32,
    /// Rows deleted per reaper batch.
    #[serde(default = "default_delete_batch_size")]
    pub expired_notifications_delete_batch_size: u32,
    /// Rows inserted per fan-out batch.
    #[serde(default = "default_creation_batch_size")]
    pub notification_creation_batch_size: usize,
    /// Buffer window for immediate emails, in minutes. `0` disables buffering.
    #[serde(default = "default_buffer_minutes")]
    pub notification_immediate_email_buffer_minutes: u32,
    /// Installation overrides applied to notification types.
    #[serde(default)]
    pub notification_types_override: BTreeMap<String, OverrideValues>,
    /// Installation overrides applied to notification apps.
    #[serde(default)]
    pub notification_apps_override: BTreeMap<String, OverrideValues>,
    /// Users per preference read query during fan-out.
    #[serde(default = "default_preference_read_batch_size")]
    pub preference_read_batch_size: usize,
    /// Mirror course preference writes into account preferences.
    #[serde(default = "default_true")]
    pub account_preferences_dual_write: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email_enabled: true,
            disabled_courses: Vec::new(),
            show_tray: true,
            notification_expiry_days: default_expiry_days(),
            expired_notifications_delete_batch_size: default_delete_batch_size(),
            notification_creation_batch_size: default_creation_batch_size(),
            notification_immediate_email_buffer_minutes: default_buffer_minutes(),
            notification_types_override: BTreeMap::new(),
            notification_apps_override: BTreeMap::new(),
            preference_read_batch_size: default_preference_read_batch_size(),
            account_preferences_dual_write: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_expiry_days() -> u32 {
    60
}

fn default_delete_batch_size() -> u32 {
    10_000
}

fn default_creation_batch_size() -> usize {
    100
}

fn default_buffer_minutes() -> u32 {
    15
}

fn default_preference_read_batch_size() -> usize {
    1000
}
