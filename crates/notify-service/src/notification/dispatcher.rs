//! Fan-out of one producer event to many recipients.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use notify_core::error::AppError;
use notify_core::events::NotificationEvent;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_database::store::{NotificationStore, UserDirectory};
use notify_entity::notification::{ContentContext, NewNotification, Notification};
use notify_entity::preference::{EmailCadence, PreferenceConfig};
use notify_entity::schema::PreferenceSchema;

use super::grouping::{GroupingRegistry, coalesce};
use crate::email::EmailDecisionEngine;
use crate::events::EventBus;
use crate::flags::FeatureFlags;
use crate::preference::PreferenceService;

/// Email decisions evaluated concurrently per fan-out call.
const EMAIL_CONCURRENCY: usize = 8;

/// One producer event.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    /// Intended recipients; duplicates are ignored.
    pub user_ids: Vec<UserId>,
    /// Course the event happened in.
    pub course_id: CourseKey,
    /// Owning app.
    pub app_name: String,
    /// Notification type.
    pub notification_type: String,
    /// Template context.
    pub context: ContentContext,
    /// Link target.
    pub content_url: Option<String>,
    /// Grouping key; events with the same key may be coalesced.
    pub group_by_id: Option<String>,
}

/// What a fan-out call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Rows inserted.
    pub created: usize,
    /// Existing rows regrouped.
    pub grouped: usize,
    /// Users that received a notification.
    pub recipients: usize,
}

/// Implements `send_notifications`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationStore>,
    directory: Arc<dyn UserDirectory>,
    preferences: PreferenceService,
    grouping: Arc<GroupingRegistry>,
    email: EmailDecisionEngine,
    flags: Arc<dyn FeatureFlags>,
    events: Arc<EventBus>,
    schema: Arc<PreferenceSchema>,
    creation_batch_size: usize,
}

impl NotificationDispatcher {
    /// Creates a new dispatcher.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
        preferences: PreferenceService,
        grouping: Arc<GroupingRegistry>,
        email: EmailDecisionEngine,
        flags: Arc<dyn FeatureFlags>,
        events: Arc<EventBus>,
        schema: Arc<PreferenceSchema>,
        creation_batch_size: usize,
    ) -> Self {
        Self {
            notifications,
            directory,
            preferences,
            grouping,
            email,
            flags,
            events,
            schema,
            creation_batch_size: creation_batch_size.max(1),
        }
    }

    /// Deliver one event. Fails on `InvalidContext`, `UnknownType` and
    /// `UnknownApp`, and on storage errors before anything was written.
    pub async fn send_notifications(&self, request: &SendRequest) -> AppResult<DispatchSummary> {
        self.send_notifications_at(request, Utc::now()).await
    }

    /// [`send_notifications`](Self::send_notifications) at an explicit time.
    pub async fn send_notifications_at(
        &self,
        request: &SendRequest,
        now: DateTime<Utc>,
    ) -> AppResult<DispatchSummary> {
        let course_id = &request.course_id;
        if !self.flags.notifications_enabled(course_id) {
            debug!(course_key = %course_id, "Notifications disabled for course");
            return Ok(DispatchSummary::default());
        }
        self.validate(request)?;

        let mut seen = HashSet::with_capacity(request.user_ids.len());
        let user_ids: Vec<UserId> = request
            .user_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if user_ids.is_empty() {
            return Ok(DispatchSummary::default());
        }

        let configs = self
            .preferences
            .preferences_for(&user_ids, course_id, now)
            .await?;
        let mut audience: Vec<UserId> = user_ids
            .into_iter()
            .filter(|id| {
                configs.get(id).is_some_and(|config| {
                    config.is_deliverable(&request.app_name, &request.notification_type)
                })
            })
            .collect();
        audience = self.visible_audience(request, audience).await?;
        if audience.is_empty() {
            debug!(
                course_key = %course_id,
                notification_type = %request.notification_type,
                "No recipient accepts the notification"
            );
            return Ok(DispatchSummary::default());
        }

        let (delivered, grouped) = self.regroup(request, &audience, &configs, now).await?;
        let grouped_users: HashSet<UserId> = delivered.iter().map(|n| n.user_id).collect();

        let records: Vec<NewNotification> = audience
            .iter()
            .filter(|id| !grouped_users.contains(id))
            .map(|id| {
                let (web, email) = channels(configs.get(id), request);
                NewNotification {
                    user_id: *id,
                    course_id: Some(course_id.clone()),
                    app_name: request.app_name.clone(),
                    notification_type: request.notification_type.clone(),
                    content_context: request.context.clone(),
                    content_url: request.content_url.clone(),
                    web,
                    email,
                    group_by_id: request.group_by_id.clone().unwrap_or_default(),
                    created: now,
                }
            })
            .collect();
        let created = self
            .notifications
            .bulk_create(&records, self.creation_batch_size)
            .await?;

        let summary = DispatchSummary {
            created: created.len(),
            grouped,
            recipients: audience.len(),
        };
        let mut delivered = delivered;
        delivered.extend(created);

        if self.flags.email_enabled(course_id) {
            self.run_email_decisions(&delivered, &configs, now).await;
        }

        self.events.publish_at(
            NotificationEvent::generated(
                course_id.clone(),
                &request.app_name,
                &request.notification_type,
                &audience,
            ),
            now,
        );
        info!(
            course_key = %course_id,
            app = %request.app_name,
            notification_type = %request.notification_type,
            created = summary.created,
            grouped = summary.grouped,
            "Notifications sent"
        );
        Ok(summary)
    }

    /// Producer entry point that never fails; errors are logged.
    pub async fn dispatch(&self, request: &SendRequest) -> DispatchSummary {
        match self.send_notifications(request).await {
            Ok(summary) => summary,
            Err(err) => {
                error!(
                    course_key = %request.course_id,
                    notification_type = %request.notification_type,
                    recipients = request.user_ids.len(),
                    error = %err,
                    "Failed to send notifications"
                );
                DispatchSummary::default()
            }
        }
    }

    fn validate(&self, request: &SendRequest) -> AppResult<()> {
        let definition = self.schema.require_type(&request.notification_type)?;
        self.schema.require_app(&request.app_name)?;
        if definition.app != request.app_name {
            return Err(AppError::unknown_type(&request.notification_type));
        }
        let missing: Vec<&str> = definition
            .content_context_fields
            .iter()
            .filter(|field| !request.context.contains_key(field.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::invalid_context(format!(
                "Context of '{}' is missing {}",
                request.notification_type,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    async fn visible_audience(
        &self,
        request: &SendRequest,
        audience: Vec<UserId>,
    ) -> AppResult<Vec<UserId>> {
        let Some(definition) = self.schema.notification_type(&request.notification_type) else {
            return Ok(audience);
        };
        if definition.visible_to.is_none() || audience.is_empty() {
            return Ok(audience);
        }
        let roles = self
            .directory
            .roles_in_course(&audience, &request.course_id)
            .await?;
        Ok(audience
            .into_iter()
            .filter(|id| {
                let user_roles = roles.get(id).map(Vec::as_slice).unwrap_or(&[]);
                definition.visible_for(user_roles)
            })
            .collect())
    }

    /// Coalesce into existing unread rows; returns the regrouped rows.
    async fn regroup(
        &self,
        request: &SendRequest,
        audience: &[UserId],
        configs: &HashMap<UserId, PreferenceConfig>,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<Notification>, usize)> {
        let Some(grouper) = self.grouping.get(&request.notification_type) else {
            return Ok((Vec::new(), 0));
        };
        let Some(group_by_id) = request.group_by_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok((Vec::new(), 0));
        };

        let existing = self
            .notifications
            .find_groupable(
                audience,
                &request.notification_type,
                group_by_id,
                &request.course_id,
            )
            .await?;
        let mut regrouped = Vec::with_capacity(existing.len());
        for notification in existing {
            let (web, email) = channels(configs.get(&notification.user_id), request);
            let merged = coalesce(&notification, grouper, &request.context, web, email, now);
            self.notifications.save_grouped(&merged).await?;
            regrouped.push(merged);
        }
        let count = regrouped.len();
        Ok((regrouped, count))
    }

    async fn run_email_decisions(
        &self,
        delivered: &[Notification],
        configs: &HashMap<UserId, PreferenceConfig>,
        now: DateTime<Utc>,
    ) {
        let immediate: Vec<&Notification> = delivered
            .iter()
            .filter(|n| {
                n.email
                    && configs.get(&n.user_id).is_some_and(|config| {
                        config
                            .resolve(&n.app_name, &n.notification_type)
                            .is_some_and(|pref| pref.email_cadence == EmailCadence::Immediately)
                    })
            })
            .collect();

        stream::iter(immediate)
            .for_each_concurrent(EMAIL_CONCURRENCY, |notification| async move {
                if let Err(err) = self.email.process(notification, now).await {
                    warn!(
                        user_id = %notification.user_id,
                        course_key = ?notification.course_id,
                        notification_type = %notification.notification_type,
                        error = %err,
                        "Email decision failed"
                    );
                }
            })
            .await;
    }
}

/// Per-user web and email flags for a request.
fn channels(config: Option<&PreferenceConfig>, request: &SendRequest) -> (bool, bool) {
    config
        .and_then(|config| config.resolve(&request.app_name, &request.notification_type))
        .map(|pref| (pref.web, pref.email))
        .unwrap_or((false, false))
}
