//! Worker wired over a `MemoryStore` for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use notify_core::config::{EmailConfig, WorkerConfig};
use notify_core::types::{CourseKey, NotificationId, UserId};
use notify_database::MemoryStore;
use notify_database::store::{JobStore, NotificationStore};
use notify_entity::job::JobPayload;
use notify_entity::notification::{ContentContext, EmailAction, Notification};
use notify_entity::preference::{EmailCadence, PreferenceUpdate};
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::{CourseSummary, UserProfile};
use notify_service::email::EmailRenderer;
use notify_service::{
    ConfigFeatureFlags, DigestService, EventBus, MemoryMailer, PreferenceService, RequestContext,
    RetentionService,
};

use crate::jobs::default_executor;
use crate::queue::JobQueue;
use crate::runner::{RetryPolicy, WorkerRunner};

pub(crate) fn course() -> CourseKey {
    CourseKey::new("course-v1:Org+CS101+2026")
}

pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub schema: Arc<PreferenceSchema>,
    pub mailer: Arc<MemoryMailer>,
    pub preferences: PreferenceService,
    pub queue: Arc<JobQueue>,
    pub runner: WorkerRunner,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        store
            .insert_course(CourseSummary {
                course_id: course(),
                display_name: "Intro to Computing".to_string(),
            })
            .await;
        let shared = Arc::new(store.clone());
        let schema = Arc::new(PreferenceSchema::builtin());
        let mailer = Arc::new(MemoryMailer::new());
        let events = Arc::new(EventBus::default());
        let renderer = Arc::new(EmailRenderer::new(schema.clone(), &EmailConfig::default()));

        let preferences = PreferenceService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            schema.clone(),
            1000,
            true,
        );
        let digests = DigestService::new(
            shared.clone(),
            preferences.clone(),
            shared.clone(),
            renderer,
            mailer.clone(),
            Arc::new(ConfigFeatureFlags::all_enabled()),
            events,
        );
        let retention = RetentionService::new(shared.clone(), 60, 2);

        let queue = Arc::new(JobQueue::new(shared, "worker-test"));
        let runner = WorkerRunner::new(
            queue.clone(),
            Arc::new(default_executor(digests, retention)),
            WorkerConfig::default(),
            RetryPolicy::default(),
        );

        Self {
            store,
            schema,
            mailer,
            preferences,
            queue,
            runner,
        }
    }

    pub fn jobs(&self) -> Arc<dyn JobStore> {
        Arc::new(self.store.clone())
    }

    pub async fn learner(&self, username: &str) -> UserProfile {
        let user = UserProfile {
            id: UserId::new(),
            username: username.to_string(),
            email: format!("{username}@example.org"),
            is_active: true,
            has_usable_password: true,
            language: Some("en".to_string()),
            created_at: Utc::now(),
        };
        self.store.insert_user(user.clone()).await;
        user
    }

    /// A learner whose `new_response` cadence is `Immediately`.
    pub async fn immediate_learner(&self, username: &str) -> UserProfile {
        let user = self.learner(username).await;
        let ctx = RequestContext::new(user.id, username);
        self.preferences
            .update(
                &ctx,
                &course(),
                &PreferenceUpdate::Cadence {
                    app: "discussion".to_string(),
                    notification_type: "new_response".to_string(),
                    cadence: EmailCadence::Immediately,
                },
                None,
            )
            .await
            .expect("set cadence");
        user
    }

    /// Insert an emailable `new_response` notification.
    pub async fn notification(&self, user_id: UserId, created: DateTime<Utc>) -> Notification {
        let mut context = ContentContext::new();
        if let Some(definition) = self.schema.notification_type("new_response") {
            for field in &definition.content_context_fields {
                context.insert(field.clone(), serde_json::Value::String(format!("{field}-value")));
            }
        }
        self.store
            .insert_notification(Notification {
                id: NotificationId(0),
                user_id,
                course_id: Some(course()),
                app_name: "discussion".to_string(),
                notification_type: "new_response".to_string(),
                content_context: serde_json::Value::Object(context),
                content_url: None,
                web: true,
                email: true,
                last_read: None,
                last_seen: None,
                group_by_id: String::new(),
                email_sent_on: None,
                email_scheduled: false,
                created,
                email_content: None,
            })
            .await
    }

    pub async fn sent_at(&self, notification: &Notification, at: DateTime<Utc>) {
        self.store
            .mark_emailed(&[notification.id], at)
            .await
            .expect("mark emailed");
    }

    pub async fn flag(&self, notification: &Notification, now: DateTime<Utc>) {
        self.store
            .decide_email(
                notification.user_id,
                &course(),
                notification.id,
                now,
                now,
                |_| EmailAction::ScheduleBuffer,
            )
            .await
            .expect("flag for buffer");
    }

    pub fn buffered(&self, user_id: UserId, start_date: DateTime<Utc>) -> JobPayload {
        JobPayload::SendBufferedDigest {
            user_id,
            course_key: course(),
            start_date,
            user_language: "en".to_string(),
        }
    }
}
