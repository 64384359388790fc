//! Buffered, daily and weekly digest emails.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use notify_core::error::AppError;
use notify_core::events::NotificationEvent;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, NotificationId, UserId};
use notify_database::store::{NotificationStore, UserDirectory};
use notify_entity::notification::Notification;
use notify_entity::preference::{EmailCadence, PreferenceConfig};
use notify_entity::user::UserProfile;

use super::mailer::Mailer;
use super::render::EmailRenderer;
use crate::events::EventBus;
use crate::flags::FeatureFlags;
use crate::preference::PreferenceService;

/// Slack added to every digest window so that runs drifting by a few
/// minutes do not drop notifications.
const WINDOW_SLACK_MINUTES: i64 = 15;

/// `[start, end]` covered by a cadence digest running at `now`.
pub fn digest_window(
    cadence: EmailCadence,
    now: DateTime<Utc>,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let span = match cadence {
        EmailCadence::Daily => Duration::days(1),
        EmailCadence::Weekly => Duration::days(7),
        other => {
            return Err(AppError::validation(format!(
                "No digest runs for cadence {other:?}"
            )));
        }
    };
    Ok((now - span - Duration::minutes(WINDOW_SLACK_MINUTES), now))
}

/// What a buffered digest job did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BufferedDigestOutcome {
    /// A digest went out.
    Sent {
        /// Notifications included.
        included: usize,
        /// Flagged notifications dropped by preferences.
        excluded: usize,
    },
    /// Nothing was sent; flags were cleared.
    Skipped {
        /// Why nothing was sent.
        reason: String,
        /// Flags cleared.
        cleared: usize,
    },
}

/// Totals of a cadence digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRun {
    /// Users with candidate notifications.
    pub audience: usize,
    /// Digests sent.
    pub sent: usize,
    /// Users with nothing left after filtering.
    pub skipped: usize,
    /// Users whose digest failed.
    pub failed: usize,
}

/// Sends digest emails.
#[derive(Clone)]
pub struct DigestService {
    notifications: Arc<dyn NotificationStore>,
    preferences: PreferenceService,
    directory: Arc<dyn UserDirectory>,
    renderer: Arc<EmailRenderer>,
    mailer: Arc<dyn Mailer>,
    flags: Arc<dyn FeatureFlags>,
    events: Arc<EventBus>,
}

impl DigestService {
    /// Creates a new digest service.
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        preferences: PreferenceService,
        directory: Arc<dyn UserDirectory>,
        renderer: Arc<EmailRenderer>,
        mailer: Arc<dyn Mailer>,
        flags: Arc<dyn FeatureFlags>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            notifications,
            preferences,
            directory,
            renderer,
            mailer,
            flags,
            events,
        }
    }

    /// Send the buffered digest of one `(user, course)` window.
    ///
    /// Transport failures propagate so the job can be retried; the flags
    /// stay set until a send succeeds.
    pub async fn send_buffered_digest(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        start_date: DateTime<Utc>,
        user_language: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BufferedDigestOutcome> {
        let flagged = self
            .notifications
            .scheduled_in_window(user_id, course_id, start_date, now)
            .await?;
        let flagged_ids: Vec<NotificationId> = flagged.iter().map(|n| n.id).collect();

        if !self.flags.email_enabled(course_id) {
            return self.skip(&flagged_ids, "email disabled for course").await;
        }
        if flagged.is_empty() {
            return self.skip(&flagged_ids, "no scheduled notifications").await;
        }
        let user = match self.directory.find_user(user_id).await? {
            Some(user) if user.can_receive_email() => user,
            _ => return self.skip(&flagged_ids, "user cannot receive email").await,
        };

        let configs = self
            .preferences
            .preferences_for(&[user_id], course_id, now)
            .await?;
        let (included, excluded): (Vec<Notification>, Vec<Notification>) =
            flagged.into_iter().partition(|n| {
                configs
                    .get(&user_id)
                    .is_some_and(|config| wants(config, n, EmailCadence::Immediately))
            });
        if included.is_empty() {
            return self.skip(&flagged_ids, "preferences exclude every notification").await;
        }

        debug!(
            user_id = %user_id,
            course_key = %course_id,
            language = user_language,
            included = included.len(),
            "Rendering buffered digest"
        );
        let email = self.renderer.digest(&user, &included, "buffered");
        self.mailer.send(&email).await?;

        let included_ids: Vec<NotificationId> = included.iter().map(|n| n.id).collect();
        let excluded_ids: Vec<NotificationId> = excluded.iter().map(|n| n.id).collect();
        self.notifications.mark_emailed(&included_ids, now).await?;
        if !excluded_ids.is_empty() {
            self.notifications.clear_scheduled(&excluded_ids).await?;
        }
        self.events.publish_at(
            NotificationEvent::DigestSent {
                user_id,
                cadence: EmailCadence::Immediately.as_str().to_string(),
                notification_count: included_ids.len(),
            },
            now,
        );
        info!(
            user_id = %user_id,
            course_key = %course_id,
            included = included_ids.len(),
            excluded = excluded_ids.len(),
            "Buffered digest sent"
        );
        Ok(BufferedDigestOutcome::Sent {
            included: included_ids.len(),
            excluded: excluded_ids.len(),
        })
    }

    /// Send the daily or weekly digest to every user with candidates.
    ///
    /// One user's failure never stops the run.
    pub async fn send_digest(&self, cadence: EmailCadence, now: DateTime<Utc>) -> AppResult<DigestRun> {
        let (start, end) = digest_window(cadence, now)?;
        let audience = self.notifications.digest_audience(start, end).await?;
        let mut run = DigestRun {
            audience: audience.len(),
            ..DigestRun::default()
        };
        if audience.is_empty() {
            info!(cadence = cadence.as_str(), "No digest audience");
            return Ok(run);
        }

        let users: HashMap<UserId, UserProfile> = self
            .directory
            .find_users(&audience)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        for user_id in audience {
            let Some(user) = users.get(&user_id).filter(|u| u.can_receive_email()) else {
                run.skipped += 1;
                continue;
            };
            match self.send_user_digest(user, cadence, start, end, now).await {
                Ok(true) => run.sent += 1,
                Ok(false) => run.skipped += 1,
                Err(err) => {
                    run.failed += 1;
                    warn!(
                        user_id = %user_id,
                        cadence = cadence.as_str(),
                        error = %err,
                        "Digest failed for user"
                    );
                }
            }
        }

        info!(
            cadence = cadence.as_str(),
            audience = run.audience,
            sent = run.sent,
            skipped = run.skipped,
            failed = run.failed,
            "Digest run finished"
        );
        Ok(run)
    }

    async fn send_user_digest(
        &self,
        user: &UserProfile,
        cadence: EmailCadence,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let candidates = self
            .notifications
            .digest_candidates(user.id, start, end)
            .await?;

        let mut by_course: BTreeMap<CourseKey, Vec<Notification>> = BTreeMap::new();
        for notification in candidates {
            if let Some(course_id) = notification.course_id.clone() {
                by_course.entry(course_id).or_default().push(notification);
            }
        }

        let mut included = Vec::new();
        for (course_id, notifications) in by_course {
            if !self.flags.email_enabled(&course_id) {
                continue;
            }
            let configs = self
                .preferences
                .preferences_for(&[user.id], &course_id, now)
                .await?;
            let Some(config) = configs.get(&user.id) else {
                continue;
            };
            included.extend(notifications.into_iter().filter(|n| wants(config, n, cadence)));
        }
        if included.is_empty() {
            return Ok(false);
        }

        let email = self.renderer.digest(user, &included, cadence.as_str());
        self.mailer.send(&email).await?;
        let ids: Vec<NotificationId> = included.iter().map(|n| n.id).collect();
        self.notifications.mark_emailed(&ids, now).await?;
        self.events.publish_at(
            NotificationEvent::DigestSent {
                user_id: user.id,
                cadence: cadence.as_str().to_string(),
                notification_count: ids.len(),
            },
            now,
        );
        Ok(true)
    }

    async fn skip(&self, flagged: &[NotificationId], reason: &str) -> AppResult<BufferedDigestOutcome> {
        if !flagged.is_empty() {
            self.notifications.clear_scheduled(flagged).await?;
        }
        debug!(reason, cleared = flagged.len(), "Buffered digest skipped");
        Ok(BufferedDigestOutcome::Skipped {
            reason: reason.to_string(),
            cleared: flagged.len(),
        })
    }
}

/// Whether the config lets a notification into a digest of `cadence`.
fn wants(config: &PreferenceConfig, notification: &Notification, cadence: EmailCadence) -> bool {
    let Some(app) = config.app(&notification.app_name) else {
        return false;
    };
    app.enabled
        && app
            .resolve(&notification.notification_type)
            .is_some_and(|pref| pref.email && pref.email_cadence == cadence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, course};
    use notify_entity::preference::PreferenceUpdate;

    #[test]
    fn test_windows_include_slack() {
        let now = Utc::now();
        let (start, end) = digest_window(EmailCadence::Daily, now).expect("daily");
        assert_eq!(end - start, Duration::days(1) + Duration::minutes(15));
        let (start, _) = digest_window(EmailCadence::Weekly, now).expect("weekly");
        assert_eq!(now - start, Duration::days(7) + Duration::minutes(15));
        assert!(digest_window(EmailCadence::Never, now).is_err());
        assert!(digest_window(EmailCadence::Immediately, now).is_err());
    }

    #[tokio::test]
    async fn test_buffered_digest_collects_flagged_window() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .set_cadence(user.id, "new_response", EmailCadence::Immediately)
            .await;
        let t0 = Utc::now();
        let first = harness.stored_notification(user.id, "new_response", t0).await;
        harness.engine.process(&first, t0).await.expect("first");
        for minutes in [2, 5, 7] {
            let at = t0 + Duration::minutes(minutes);
            let n = harness.stored_notification(user.id, "new_response", at).await;
            harness.engine.process(&n, at).await.expect("buffered");
        }

        let run_at = t0 + Duration::minutes(17);
        let outcome = harness
            .digests
            .send_buffered_digest(user.id, &course(), t0, "en", run_at)
            .await
            .expect("digest");
        assert_eq!(
            outcome,
            BufferedDigestOutcome::Sent {
                included: 3,
                excluded: 0
            }
        );
        let sent = harness.mailer.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.contains("3 new notifications"));
        let rows = harness.store.all_notifications().await;
        assert!(rows.iter().all(|n| !n.email_scheduled && n.email_sent_on.is_some()));
    }

    #[tokio::test]
    async fn test_buffered_digest_drops_notifications_preferences_exclude() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .set_cadence(user.id, "new_response", EmailCadence::Immediately)
            .await;
        let now = Utc::now();
        let n = harness.stored_notification(user.id, "new_response", now).await;
        harness.flag_for_buffer(&n, now).await;
        harness
            .preferences
            .update(
                &harness.ctx(&user),
                &course(),
                &PreferenceUpdate::Channel {
                    app: "discussion".to_string(),
                    notification_type: "new_response".to_string(),
                    channel: notify_entity::preference::Channel::Email,
                    value: false,
                },
                None,
            )
            .await
            .expect("turn email off");

        let outcome = harness
            .digests
            .send_buffered_digest(user.id, &course(), now, "en", now + Duration::minutes(15))
            .await
            .expect("digest");
        assert!(matches!(outcome, BufferedDigestOutcome::Skipped { cleared: 1, .. }));
        assert!(harness.mailer.sent().await.is_empty());
        let rows = harness.store.all_notifications().await;
        assert!(!rows[0].email_scheduled);
        assert!(rows[0].email_sent_on.is_none());
    }

    #[tokio::test]
    async fn test_buffered_digest_keeps_flags_when_transport_fails() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .set_cadence(user.id, "new_response", EmailCadence::Immediately)
            .await;
        let now = Utc::now();
        let n = harness.stored_notification(user.id, "new_response", now).await;
        harness.flag_for_buffer(&n, now).await;
        harness.mailer.fail_next(1);
        let err = harness
            .digests
            .send_buffered_digest(user.id, &course(), now, "en", now + Duration::minutes(15))
            .await
            .expect_err("transport down");
        assert!(err.is_transient());
        assert!(harness.store.all_notifications().await[0].email_scheduled);
    }

    #[tokio::test]
    async fn test_daily_digest_matches_cadence_and_marks_sent() {
        let harness = Harness::new().await;
        let daily = harness.learner("daily").await;
        let weekly = harness.learner("weekly").await;
        harness
            .set_cadence(weekly.id, "new_response", EmailCadence::Weekly)
            .await;
        let now = Utc::now();
        for user in [&daily, &weekly] {
            for hours in [2, 5] {
                harness
                    .stored_notification(user.id, "new_response", now - Duration::hours(hours))
                    .await;
            }
        }
        harness
            .stored_notification(daily.id, "new_response", now - Duration::days(2))
            .await;

        let run = harness
            .digests
            .send_digest(EmailCadence::Daily, now)
            .await
            .expect("run");
        assert_eq!(run.audience, 2);
        assert_eq!(run.sent, 1);
        assert_eq!(run.skipped, 1);
        let sent = harness.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, daily.email);
        assert!(sent[0].subject.contains("2 new notifications"));

        let again = harness
            .digests
            .send_digest(EmailCadence::Daily, now)
            .await
            .expect("second run");
        assert_eq!(again.sent, 0);
        assert_eq!(harness.mailer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_digest_run_survives_one_failing_user() {
        let harness = Harness::new().await;
        let first = harness.learner("first").await;
        let second = harness.learner("second").await;
        let now = Utc::now();
        for user in [&first, &second] {
            harness
                .stored_notification(user.id, "new_response", now - Duration::hours(1))
                .await;
        }
        harness.mailer.fail_next(1);
        let run = harness
            .digests
            .send_digest(EmailCadence::Daily, now)
            .await
            .expect("run");
        assert_eq!(run.failed, 1);
        assert_eq!(run.sent, 1);
    }

    #[tokio::test]
    async fn test_buffered_digest_aborts_when_email_flag_off() {
        let flags = crate::flags::ConfigFeatureFlags::all_enabled().with_email(false);
        let harness = Harness::with_flags(flags).await;
        let user = harness.learner("learner").await;
        let now = Utc::now();
        let n = harness.stored_notification(user.id, "new_response", now).await;
        harness.flag_for_buffer(&n, now).await;
        let outcome = harness
            .digests
            .send_buffered_digest(user.id, &course(), now, "en", now + Duration::minutes(15))
            .await
            .expect("digest");
        assert!(matches!(outcome, BufferedDigestOutcome::Skipped { .. }));
        assert!(harness.mailer.sent().await.is_empty());
    }
}
