//! Preference mutations.

use serde::{Deserialize, Serialize};

use notify_core::types::CourseKey;

use super::cadence::EmailCadence;
use super::channel::Channel;

/// A single validated preference change inside one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreferenceUpdate {
    /// Toggle one channel of a type (or of `core`).
    Channel {
        /// App name.
        app: String,
        /// Type name or `core`.
        notification_type: String,
        /// Channel to change.
        channel: Channel,
        /// New value.
        value: bool,
    },
    /// Change the email cadence of a type (or of `core`).
    Cadence {
        /// App name.
        app: String,
        /// Type name or `core`.
        notification_type: String,
        /// New cadence.
        cadence: EmailCadence,
    },
}

impl PreferenceUpdate {
    /// The targeted app.
    pub fn app(&self) -> &str {
        match self {
            Self::Channel { app, .. } | Self::Cadence { app, .. } => app,
        }
    }

    /// The targeted type.
    pub fn notification_type(&self) -> &str {
        match self {
            Self::Channel {
                notification_type, ..
            }
            | Self::Cadence {
                notification_type, ..
            } => notification_type,
        }
    }
}

/// Patch carried inside a one-click unsubscribe link.
///
/// A missing field matches every value at that level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribePatch {
    /// Restrict to one app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Restrict to one type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Restrict to one channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    /// Value written to every matched channel.
    #[serde(default)]
    pub value: bool,
    /// Restrict to one course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseKey>,
}

impl UnsubscribePatch {
    /// Every email channel off; used when a link carries no patch token.
    pub fn all_email() -> Self {
        Self {
            channel: Some(Channel::Email),
            value: false,
            ..Self::default()
        }
    }

    /// Whether this patch covers an `(app, type)` pair.
    pub fn matches(&self, app: &str, notification_type: &str) -> bool {
        self.app_name.as_deref().is_none_or(|a| a == app)
            && self
                .notification_type
                .as_deref()
                .is_none_or(|t| t == notification_type)
    }

    /// Channels written by this patch.
    pub fn channels(&self) -> Vec<Channel> {
        match self.channel {
            Some(channel) => vec![channel],
            None => Channel::ALL.to_vec(),
        }
    }
}
