//! Feature flags gating notification and email delivery per course.

use std::collections::HashSet;

use notify_core::config::NotificationsConfig;
use notify_core::types::CourseKey;

/// Oracle answering whether delivery is switched on for a course.
pub trait FeatureFlags: Send + Sync + std::fmt::Debug {
    /// Whether notifications are enabled for the course.
    fn notifications_enabled(&self, course_id: &CourseKey) -> bool;

    /// Whether notification emails are enabled for the course.
    fn email_enabled(&self, course_id: &CourseKey) -> bool;
}

/// Flags read from the `notifications` configuration section.
#[derive(Debug, Clone)]
pub struct ConfigFeatureFlags {
    enabled: bool,
    email_enabled: bool,
    disabled_courses: HashSet<String>,
}

impl ConfigFeatureFlags {
    /// Build from the configuration section.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            email_enabled: config.email_enabled,
            disabled_courses: config.disabled_courses.iter().cloned().collect(),
        }
    }

    /// Everything on.
    pub fn all_enabled() -> Self {
        Self {
            enabled: true,
            email_enabled: true,
            disabled_courses: HashSet::new(),
        }
    }

    /// Copy with the email flag switched.
    pub fn with_email(mut self, enabled: bool) -> Self {
        self.email_enabled = enabled;
        self
    }

    fn course_allowed(&self, course_id: &CourseKey) -> bool {
        !self.disabled_courses.contains(course_id.as_str())
    }
}

impl FeatureFlags for ConfigFeatureFlags {
    fn notifications_enabled(&self, course_id: &CourseKey) -> bool {
        self.enabled && self.course_allowed(course_id)
    }

    fn email_enabled(&self, course_id: &CourseKey) -> bool {
        self.notifications_enabled(course_id) && self.email_enabled
    }
}
