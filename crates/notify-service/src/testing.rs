//! Fully wired services over a `MemoryStore` for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use notify_core::config::EmailConfig;
use notify_core::types::{CourseKey, NotificationId, UserId};
use notify_database::MemoryStore;
use notify_database::store::NotificationStore;
use notify_entity::notification::{ContentContext, EmailAction, Notification};
use notify_entity::preference::{EmailCadence, PreferenceUpdate};
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::{CourseSummary, UserProfile};

use crate::context::RequestContext;
use crate::email::{DigestService, EmailDecisionEngine, EmailRenderer, MemoryMailer};
use crate::events::EventBus;
use crate::flags::{ConfigFeatureFlags, FeatureFlags};
use crate::notification::{GroupingRegistry, NotificationDispatcher, NotificationService};
use crate::preference::PreferenceService;
use crate::retention::RetentionService;
use crate::unsubscribe::{TokenCipher, UnsubscribeService};

pub(crate) const SECRET: &str = "unit-test-unsubscribe-secret";

pub(crate) fn course() -> CourseKey {
    CourseKey::new("course-v1:Org+CS101+2026")
}

pub(crate) fn context_for(schema: &PreferenceSchema, notification_type: &str) -> ContentContext {
    let mut context = ContentContext::new();
    if let Some(definition) = schema.notification_type(notification_type) {
        for field in &definition.content_context_fields {
            context.insert(field.clone(), serde_json::Value::String(format!("{field}-value")));
        }
    }
    context
}

pub(crate) fn new_response_request(user_ids: &[UserId]) -> crate::notification::SendRequest {
    crate::notification::SendRequest {
        user_ids: user_ids.to_vec(),
        course_id: course(),
        app_name: "discussion".to_string(),
        notification_type: "new_response".to_string(),
        context: context_for(&PreferenceSchema::builtin(), "new_response"),
        content_url: Some("/courses/cs101/discussion/1".to_string()),
        group_by_id: None,
    }
}

pub(crate) struct Harness {
    pub store: MemoryStore,
    pub schema: Arc<PreferenceSchema>,
    pub mailer: Arc<MemoryMailer>,
    pub events: Arc<EventBus>,
    pub cipher: Arc<TokenCipher>,
    pub preferences: PreferenceService,
    pub engine: EmailDecisionEngine,
    pub digests: DigestService,
    pub dispatcher: NotificationDispatcher,
    pub notifications: NotificationService,
    pub retention: RetentionService,
    pub unsubscribe: UnsubscribeService,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(15, Arc::new(ConfigFeatureFlags::all_enabled())).await
    }

    pub async fn with_buffer(buffer_minutes: u32) -> Self {
        Self::build(buffer_minutes, Arc::new(ConfigFeatureFlags::all_enabled())).await
    }

    pub async fn with_flags(flags: ConfigFeatureFlags) -> Self {
        Self::build(15, Arc::new(flags)).await
    }

    async fn build(buffer_minutes: u32, flags: Arc<dyn FeatureFlags>) -> Self {
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
        let cipher = Arc::new(TokenCipher::new(SECRET));
        let renderer = Arc::new(
            EmailRenderer::new(schema.clone(), &EmailConfig::default())
                .with_unsubscribe(cipher.clone()),
        );

        let preferences = PreferenceService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            schema.clone(),
            1000,
            true,
        );
        let engine = EmailDecisionEngine::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            renderer.clone(),
            mailer.clone(),
            events.clone(),
            buffer_minutes,
            4,
        );
        let digests = DigestService::new(
            shared.clone(),
            preferences.clone(),
            shared.clone(),
            renderer.clone(),
            mailer.clone(),
            flags.clone(),
            events.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            shared.clone(),
            shared.clone(),
            preferences.clone(),
            Arc::new(GroupingRegistry::builtin()),
            engine.clone(),
            flags,
            events.clone(),
            schema.clone(),
            100,
        );
        let notifications = NotificationService::new(
            shared.clone(),
            events.clone(),
            schema.clone(),
            renderer,
            60,
            true,
        );
        let retention = RetentionService::new(shared.clone(), 60, 10_000);
        let unsubscribe =
            UnsubscribeService::new(cipher.clone(), shared, preferences.clone(), events.clone());

        Self {
            store,
            schema,
            mailer,
            events,
            cipher,
            preferences,
            engine,
            digests,
            dispatcher,
            notifications,
            retention,
            unsubscribe,
        }
    }

    pub fn store_handle(&self) -> Arc<dyn NotificationStore> {
        Arc::new(self.store.clone())
    }

    pub fn ctx(&self, user: &UserProfile) -> RequestContext {
        RequestContext::new(user.id, user.username.clone())
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

    /// Insert an emailable notification without going through fan-out.
    pub async fn stored_notification(
        &self,
        user_id: UserId,
        notification_type: &str,
        created: DateTime<Utc>,
    ) -> Notification {
        let app_name = self
            .schema
            .notification_type(notification_type)
            .map(|definition| definition.app.clone())
            .unwrap_or_else(|| "discussion".to_string());
        self.store
            .insert_notification(Notification {
                id: NotificationId(0),
                user_id,
                course_id: Some(course()),
                app_name,
                notification_type: notification_type.to_string(),
                content_context: serde_json::Value::Object(context_for(
                    &self.schema,
                    notification_type,
                )),
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

    /// Flag a notification as waiting for a buffered digest.
    pub async fn flag_for_buffer(&self, notification: &Notification, now: DateTime<Utc>) {
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

    pub async fn set_cadence(&self, user_id: UserId, notification_type: &str, cadence: EmailCadence) {
        let app = self
            .schema
            .notification_type(notification_type)
            .map(|definition| definition.app.clone())
            .unwrap_or_else(|| "discussion".to_string());
        let ctx = RequestContext::new(user_id, "learner");
        self.preferences
            .update(
                &ctx,
                &course(),
                &PreferenceUpdate::Cadence {
                    app,
                    notification_type: notification_type.to_string(),
                    cadence,
                },
                None,
            )
            .await
            .expect("set cadence");
    }
}
