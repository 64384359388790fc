//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use notify_api::auth::{Claims, JwtEncoder};
use notify_api::{Services, Stores, build_app};
use notify_core::config::AppConfig;
use notify_core::types::{CourseKey, NotificationId, UserId};
use notify_database::{JobStore, MemoryStore};
use notify_entity::notification::{ContentContext, Notification};
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::{CourseSummary, UserProfile};
use notify_service::{MemoryMailer, SendRequest};
use notify_worker::{JobQueue, RetryPolicy, WorkerRunner};

/// Primary course of every test.
pub const COURSE: &str = "course-v1:Org+CS101+2026";
/// Second course, for cross-course behavior.
pub const SECOND_COURSE: &str = "course-v1:Org+CS202+2026";

/// Result of a test request
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// JSON body, `Null` when empty
    pub body: Value,
}

/// Test application context over an in-memory store
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// The store behind every service
    pub store: MemoryStore,
    /// Wired services
    pub services: Services,
    /// Captured outgoing email
    pub mailer: Arc<MemoryMailer>,
    /// Application config
    pub config: Arc<AppConfig>,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let config = AppConfig::from_toml(include_str!("../fixtures/test_config.toml"))
            .expect("Failed to load test config");
        Self::with_config(config).await
    }

    /// Create a test application with an explicit configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let store = MemoryStore::new();
        for (course_id, name) in [
            (COURSE, "Intro to Computing"),
            (SECOND_COURSE, "Data Structures"),
        ] {
            store
                .insert_course(CourseSummary {
                    course_id: CourseKey::new(course_id),
                    display_name: name.to_string(),
                })
                .await;
        }

        let mailer = Arc::new(MemoryMailer::new());
        let services = Services::build(&config, &Stores::memory(&store), mailer.clone());
        let encoder = JwtEncoder::new(&config.auth);
        let config = Arc::new(config);
        let router = build_app(services.app_state(config.clone()));

        Self {
            router,
            store,
            services,
            mailer,
            config,
            encoder,
        }
    }

    /// Insert an active user with a usable password
    pub async fn create_test_user(&self, username: &str) -> UserProfile {
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

    /// Bearer token for `user`
    pub fn token(&self, user: &UserProfile) -> String {
        let claims = Claims::new(user.id, &user.username, Utc::now(), Duration::hours(1));
        self.encoder.encode(&claims).expect("Failed to sign token")
    }

    /// Make a JSON request
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        TestResponse { status, body }
    }

    /// PATCH one channel of one type in `course`
    pub async fn patch_preference(
        &self,
        user: &UserProfile,
        course: &str,
        app: &str,
        notification_type: &str,
        channel: &str,
        value: Value,
    ) -> TestResponse {
        self.request(
            "PATCH",
            &format!("/api/configurations/{course}"),
            Some(serde_json::json!({
                "notification_app": app,
                "notification_type": notification_type,
                "notification_channel": channel,
                "value": value,
            })),
            Some(&self.token(user)),
        )
        .await
    }

    /// Producer request for `notification_type` in the primary course
    pub fn send_request(&self, user_ids: &[UserId], notification_type: &str) -> SendRequest {
        let app_name = self
            .services
            .schema
            .notification_type(notification_type)
            .map(|definition| definition.app.clone())
            .expect("Unknown notification type");
        SendRequest {
            user_ids: user_ids.to_vec(),
            course_id: CourseKey::new(COURSE),
            app_name,
            notification_type: notification_type.to_string(),
            context: context_for(&self.services.schema, notification_type),
            content_url: Some("/courses/cs101/discussion/1".to_string()),
            group_by_id: None,
        }
    }

    /// Insert a notification directly, bypassing fan-out
    pub async fn stored_notification(
        &self,
        user_id: UserId,
        created: DateTime<Utc>,
    ) -> Notification {
        self.store
            .insert_notification(Notification {
                id: NotificationId(0),
                user_id,
                course_id: Some(CourseKey::new(COURSE)),
                app_name: "discussion".to_string(),
                notification_type: "new_response".to_string(),
                content_context: Value::Object(context_for(&self.services.schema, "new_response")),
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

    /// Stored notifications of `user`, oldest first
    pub async fn notifications_of(&self, user_id: UserId) -> Vec<Notification> {
        let mut rows: Vec<Notification> = self
            .store
            .all_notifications()
            .await
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        rows.sort_by_key(|n| n.id);
        rows
    }

    /// Job store handle
    pub fn jobs(&self) -> Arc<dyn JobStore> {
        Stores::memory(&self.store).jobs
    }

    /// Worker runner over the store's job queue
    pub fn worker(&self) -> WorkerRunner {
        let retry = RetryPolicy::from_config(&self.config.digest);
        let queue = Arc::new(JobQueue::new(self.jobs(), "test-worker"));
        let executor = Arc::new(notify_worker::jobs::default_executor(
            self.services.digests.clone(),
            self.services.retention.clone(),
        ));
        WorkerRunner::new(queue, executor, self.config.worker.clone(), retry)
    }
}

/// Template context carrying every field the type declares
pub fn context_for(schema: &PreferenceSchema, notification_type: &str) -> ContentContext {
    let mut context = ContentContext::new();
    if let Some(definition) = schema.notification_type(notification_type) {
        for field in &definition.content_context_fields {
            context.insert(field.clone(), Value::String(format!("{field}-value")));
        }
    }
    context
}
