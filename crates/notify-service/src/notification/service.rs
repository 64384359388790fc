//! Tray listing, unseen counts and read/seen state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use notify_core::error::AppError;
use notify_core::events::NotificationEvent;
use notify_core::result::AppResult;
use notify_core::types::{NotificationId, PageRequest, PageResponse};
use notify_database::store::NotificationStore;
use notify_entity::notification::{ListFilter, Notification};
use notify_entity::schema::PreferenceSchema;

use crate::context::RequestContext;
use crate::email::EmailRenderer;
use crate::events::EventBus;

/// A notification as shown in the tray.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    /// The stored notification.
    #[serde(flatten)]
    pub notification: Notification,
    /// Rendered HTML content.
    pub content: String,
}

/// Unseen counters shown on the tray icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationCount {
    /// Unseen notifications in total.
    pub count: i64,
    /// Unseen notifications per app, zero for apps without any.
    pub count_by_app_name: BTreeMap<String, i64>,
    /// Retention window in days.
    pub notification_expiry_days: u32,
    /// Whether the tray is shown.
    pub show_notifications_tray: bool,
}

/// Result message of a read or seen update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    /// Human-readable outcome.
    pub message: String,
}

impl StatusMessage {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// User-facing notification reads and state changes.
#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationStore>,
    events: Arc<EventBus>,
    schema: Arc<PreferenceSchema>,
    renderer: Arc<EmailRenderer>,
    expiry_days: u32,
    show_tray: bool,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        events: Arc<EventBus>,
        schema: Arc<PreferenceSchema>,
        renderer: Arc<EmailRenderer>,
        expiry_days: u32,
        show_tray: bool,
    ) -> Self {
        Self {
            notifications,
            events,
            schema,
            renderer,
            expiry_days,
            show_tray,
        }
    }

    fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.expiry_days))
    }

    /// Page through the caller's notifications, newest first.
    ///
    /// `tray_opened` publishes the unseen count at the time of the call.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        app_name: Option<String>,
        tray_opened: bool,
        page: PageRequest,
    ) -> AppResult<PageResponse<NotificationView>> {
        let now = ctx.request_time;
        let filter = ListFilter {
            app_name,
            expiry_cutoff: self.expiry_cutoff(now),
        };
        let rows = self.notifications.list_for(ctx.user_id, &filter, page).await?;

        if tray_opened {
            let unseen: i64 = self
                .notifications
                .count_unseen(ctx.user_id, filter.expiry_cutoff)
                .await?
                .values()
                .sum();
            self.events.publish_at(
                NotificationEvent::TrayOpened {
                    user_id: ctx.user_id,
                    unseen_count: unseen,
                },
                now,
            );
        }

        Ok(rows.map(|notification| NotificationView {
            content: self.renderer.render_content(&notification),
            notification,
        }))
    }

    /// Unseen counts of the caller.
    pub async fn count(&self, ctx: &RequestContext) -> AppResult<NotificationCount> {
        let unseen = self
            .notifications
            .count_unseen(ctx.user_id, self.expiry_cutoff(ctx.request_time))
            .await?;
        let mut count_by_app_name: BTreeMap<String, i64> = self
            .schema
            .app_names()
            .map(|app| (app.to_string(), 0))
            .collect();
        for (app, n) in unseen {
            *count_by_app_name.entry(app).or_insert(0) += n;
        }
        Ok(NotificationCount {
            count: count_by_app_name.values().sum(),
            count_by_app_name,
            notification_expiry_days: self.expiry_days,
            show_notifications_tray: self.show_tray,
        })
    }

    /// Mark one notification, or every notification of an app, read.
    ///
    /// `notification_id` takes priority over `app_name`.
    pub async fn mark_read(
        &self,
        ctx: &RequestContext,
        notification_id: Option<NotificationId>,
        app_name: Option<&str>,
    ) -> AppResult<StatusMessage> {
        let now = ctx.request_time;
        if let Some(id) = notification_id {
            let outcome = self
                .notifications
                .mark_read(ctx.user_id, id, now)
                .await?
                .ok_or_else(|| AppError::not_found("Notification not found."))?;
            if outcome.first_read {
                self.events.publish_at(
                    NotificationEvent::Read {
                        user_id: ctx.user_id,
                        notification_id: id,
                        app_name: outcome.notification.app_name.clone(),
                        notification_type: outcome.notification.notification_type.clone(),
                        first_read: true,
                    },
                    now,
                );
            }
            return Ok(StatusMessage::new("Notification marked read."));
        }

        match app_name.filter(|app| self.schema.app(app).is_some()) {
            Some(app) => {
                let marked = self.notifications.mark_app_read(ctx.user_id, app, now).await?;
                info!(user_id = %ctx.user_id, app, marked, "Notifications marked read");
                self.events.publish_at(
                    NotificationEvent::AppAllRead {
                        user_id: ctx.user_id,
                        app_name: app.to_string(),
                        marked,
                    },
                    now,
                );
                Ok(StatusMessage::new("Notifications marked read."))
            }
            None => Err(AppError::validation("Invalid app_name or notification_id.")),
        }
    }

    /// Mark every unseen notification of an app seen.
    pub async fn mark_seen(&self, ctx: &RequestContext, app_name: &str) -> AppResult<StatusMessage> {
        self.schema.require_app(app_name)?;
        let now = ctx.request_time;
        self.notifications
            .mark_seen(ctx.user_id, app_name, now)
            .await?;
        self.events.publish_at(
            NotificationEvent::Seen {
                user_id: ctx.user_id,
                app_name: app_name.to_string(),
            },
            now,
        );
        Ok(StatusMessage::new("Notifications marked as seen."))
    }
}
