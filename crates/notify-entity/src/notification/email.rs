//! Email delivery state of a (user, course) buffer window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the locked window looked like when a decision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailWindow {
    /// Some notification in the window was emailed after the threshold.
    pub has_recent_email: bool,
    /// Some notification in the window waits for a buffered digest.
    pub has_scheduled: bool,
    /// Latest `email_sent_on` observed in the window.
    pub last_sent_on: Option<DateTime<Utc>>,
}

impl EmailWindow {
    /// Summarize `(email_sent_on, email_scheduled)` pairs of the rows in a window.
    pub fn observe<I>(rows: I, threshold: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = (Option<DateTime<Utc>>, bool)>,
    {
        let mut window = Self {
            has_recent_email: false,
            has_scheduled: false,
            last_sent_on: None,
        };
        for (sent_on, scheduled) in rows {
            if let Some(sent_on) = sent_on {
                if sent_on >= threshold {
                    window.has_recent_email = true;
                }
                window.last_sent_on = window.last_sent_on.max(Some(sent_on));
            }
            window.has_scheduled |= scheduled;
        }
        window
    }
}

/// Outcome of the immediate-email decision for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailAction {
    /// Email the notification now.
    SendImmediate,
    /// Flag the notification and schedule a buffered digest.
    ScheduleBuffer,
    /// Flag the notification; a digest is already scheduled.
    AddToBuffer,
}

impl EmailAction {
    /// Return the action name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendImmediate => "send_immediate",
            Self::ScheduleBuffer => "schedule_buffer",
            Self::AddToBuffer => "add_to_buffer",
        }
    }
}

/// Pure decision function applied while the window is locked.
pub type DecisionFn = fn(&EmailWindow) -> EmailAction;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_observe_empty_window() {
        let window = EmailWindow::observe(Vec::new(), Utc::now());
        assert!(!window.has_recent_email);
        assert!(!window.has_scheduled);
        assert_eq!(window.last_sent_on, None);
    }

    #[test]
    fn test_observe_ignores_sends_before_threshold() {
        let now = Utc::now();
        let threshold = now - Duration::minutes(15);
        let old = now - Duration::minutes(20);
        let recent = now - Duration::minutes(5);
        let window = EmailWindow::observe(vec![(Some(old), false)], threshold);
        assert!(!window.has_recent_email);
        let window =
            EmailWindow::observe(vec![(Some(old), false), (Some(recent), true)], threshold);
        assert!(window.has_recent_email);
        assert!(window.has_scheduled);
        assert_eq!(window.last_sent_on, Some(recent));
    }
}
