//! Immediate-email decisions per (user, course) buffer window.
//!
//! The first email in a window goes out right away. Any later notification
//! inside the buffer is flagged, and exactly one delayed digest job is
//! scheduled to pick up every flagged row when the buffer elapses.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use notify_core::events::NotificationEvent;
use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_database::store::{EmailDecision, JobStore, NotificationStore, UserDirectory};
use notify_entity::job::{CreateJob, JobPayload};
use notify_entity::notification::{EmailAction, EmailWindow, Notification};

use super::mailer::Mailer;
use super::render::EmailRenderer;
use crate::events::EventBus;

/// The decision table.
///
/// | recent email | scheduled | action |
/// |---|---|---|
/// | no | any | send immediately |
/// | yes | no | schedule a buffered digest |
/// | yes | yes | join the scheduled digest |
pub fn decide(window: &EmailWindow) -> EmailAction {
    match (window.has_recent_email, window.has_scheduled) {
        (false, _) => EmailAction::SendImmediate,
        (true, false) => EmailAction::ScheduleBuffer,
        (true, true) => EmailAction::AddToBuffer,
    }
}

/// Runs the decision for freshly delivered notifications.
#[derive(Clone)]
pub struct EmailDecisionEngine {
    notifications: Arc<dyn NotificationStore>,
    jobs: Arc<dyn JobStore>,
    directory: Arc<dyn UserDirectory>,
    renderer: Arc<EmailRenderer>,
    mailer: Arc<dyn Mailer>,
    events: Arc<EventBus>,
    buffer: Duration,
    digest_max_attempts: i32,
}

impl EmailDecisionEngine {
    /// Creates a new engine.
    ///
    /// `buffer_minutes = 0` disables buffering. `digest_max_attempts` is
    /// stamped on scheduled digest jobs (first attempt plus retries).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        jobs: Arc<dyn JobStore>,
        directory: Arc<dyn UserDirectory>,
        renderer: Arc<EmailRenderer>,
        mailer: Arc<dyn Mailer>,
        events: Arc<EventBus>,
        buffer_minutes: u32,
        digest_max_attempts: i32,
    ) -> Self {
        Self {
            notifications,
            jobs,
            directory,
            renderer,
            mailer,
            events,
            buffer: Duration::minutes(i64::from(buffer_minutes)),
            digest_max_attempts: digest_max_attempts.max(1),
        }
    }

    /// Decide and act for one notification.
    ///
    /// The decision and its row update commit together under the window
    /// lock; the email or job submission happens after the commit.
    pub async fn process(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> AppResult<EmailAction> {
        let Some(course_id) = notification.course_id.clone() else {
            return Err(AppError::validation("Email decisions need a course"));
        };

        if self.buffer.is_zero() {
            self.notifications
                .mark_emailed(&[notification.id], now)
                .await?;
            self.send_immediate(notification, &course_id).await?;
            return Ok(EmailAction::SendImmediate);
        }

        let threshold = now - self.buffer;
        let decision = self.locked_decision(notification, &course_id, threshold, now).await?;
        debug!(
            user_id = %notification.user_id,
            course_key = %course_id,
            notification_id = %notification.id,
            action = decision.action.as_str(),
            "Email decision"
        );

        match decision.action {
            EmailAction::SendImmediate => self.send_immediate(notification, &course_id).await?,
            EmailAction::ScheduleBuffer => {
                let start_date = decision.window.last_sent_on.unwrap_or(threshold);
                self.schedule_digest(notification.user_id, &course_id, start_date, now)
                    .await?;
            }
            EmailAction::AddToBuffer => {}
        }
        Ok(decision.action)
    }

    async fn locked_decision(
        &self,
        notification: &Notification,
        course_id: &CourseKey,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<EmailDecision> {
        let attempt = self
            .notifications
            .decide_email(
                notification.user_id,
                course_id,
                notification.id,
                threshold,
                now,
                decide,
            )
            .await;
        match attempt {
            Err(err) if err.is_transient() => {
                warn!(
                    user_id = %notification.user_id,
                    course_key = %course_id,
                    error = %err,
                    "Email decision conflicted, retrying once"
                );
                self.notifications
                    .decide_email(
                        notification.user_id,
                        course_id,
                        notification.id,
                        threshold,
                        now,
                        decide,
                    )
                    .await
            }
            other => other,
        }
    }

    async fn send_immediate(&self, notification: &Notification, course_id: &CourseKey) -> AppResult<()> {
        let Some(user) = self.directory.find_user(notification.user_id).await? else {
            debug!(user_id = %notification.user_id, "Skipping email for unknown user");
            return Ok(());
        };
        if !user.can_receive_email() {
            debug!(user_id = %user.id, "Skipping email for user who cannot receive it");
            return Ok(());
        }
        let email = self.renderer.immediate(&user, notification);
        if let Err(err) = self.mailer.send(&email).await {
            warn!(
                user_id = %user.id,
                course_key = %course_id,
                notification_id = %notification.id,
                error = %err,
                "Immediate email undelivered"
            );
            // The row must not count as the window's recent email.
            if let Err(clear_err) = self.notifications.clear_emailed(&[notification.id]).await {
                warn!(
                    notification_id = %notification.id,
                    error = %clear_err,
                    "Failed to clear send time of undelivered email"
                );
            }
            return Err(err);
        }
        self.events.publish(NotificationEvent::EmailSent {
            user_id: user.id,
            course_key: course_id.clone(),
            notification_id: notification.id,
        });
        Ok(())
    }

    async fn schedule_digest(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let user_language = self
            .directory
            .find_user(user_id)
            .await?
            .map(|user| user.language_or_default().to_string())
            .unwrap_or_else(|| "en".to_string());
        let payload = JobPayload::SendBufferedDigest {
            user_id,
            course_key: course_id.clone(),
            start_date,
            user_language,
        };
        let run_at = now + self.buffer;
        let job = CreateJob::from_payload(&payload, self.digest_max_attempts, Some(run_at))?;
        let job = self.jobs.enqueue(&job).await?;
        info!(
            job_id = %job.id,
            user_id = %user_id,
            course_key = %course_id,
            run_at = %run_at,
            "Buffered digest scheduled"
        );
        Ok(())
    }
}
