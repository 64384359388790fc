//! Application builder: wires stores, services, worker and router into a
//! running server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use notify_core::config::AppConfig;
use notify_core::error::AppError;
use notify_database::repositories::{
    DirectoryRepository, JobRepository, NotificationRepository, PreferenceRepository,
};
use notify_database::{
    CourseCatalog, DatabasePool, JobStore, MemoryStore, NotificationStore, PreferenceStore,
    UserDirectory,
};
use notify_entity::schema::PreferenceSchema;
use notify_service::email::{EmailRenderer, mailer_from_config};
use notify_service::{
    ConfigFeatureFlags, DigestService, EmailDecisionEngine, EventBus, FeatureFlags,
    GroupingRegistry, Mailer, NotificationDispatcher, NotificationService, PreferenceService,
    RetentionService, TokenCipher, UnsubscribeService, apply_overrides,
};
use notify_worker::{CronScheduler, JobQueue, RetryPolicy, WorkerRunner};

use crate::auth::JwtDecoder;
use crate::middleware::cors::build_cors_layer;
use crate::middleware::rate_limit::RateLimiter;
use crate::router::build_router;
use crate::state::AppState;

/// Storage handles behind every service.
#[derive(Clone)]
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub jobs: Arc<dyn JobStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn CourseCatalog>,
}

impl Stores {
    /// PostgreSQL repositories sharing one pool.
    pub fn postgres(db: &DatabasePool) -> Self {
        let pool = db.pool().clone();
        let directory = Arc::new(DirectoryRepository::new(pool.clone()));
        Self {
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            preferences: Arc::new(PreferenceRepository::new(pool.clone())),
            jobs: Arc::new(JobRepository::new(pool)),
            directory: directory.clone(),
            catalog: directory,
        }
    }

    /// Every seam backed by the same in-process store.
    pub fn memory(store: &MemoryStore) -> Self {
        let shared = Arc::new(store.clone());
        Self {
            notifications: shared.clone(),
            preferences: shared.clone(),
            jobs: shared.clone(),
            directory: shared.clone(),
            catalog: shared,
        }
    }
}

/// Fully constructed domain services.
#[derive(Clone)]
pub struct Services {
    pub schema: Arc<PreferenceSchema>,
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

impl Services {
    /// Construct every service from configuration.
    ///
    /// The preference schema is the built-in registry with the installation
    /// overrides applied once, here.
    pub fn build(config: &AppConfig, stores: &Stores, mailer: Arc<dyn Mailer>) -> Self {
        let notify = &config.notifications;
        let schema = Arc::new(apply_overrides(
            &PreferenceSchema::builtin(),
            &notify.notification_types_override,
            &notify.notification_apps_override,
        ));
        let events = Arc::new(EventBus::default());
        let cipher = Arc::new(TokenCipher::new(&config.unsubscribe.secret));
        let flags: Arc<dyn FeatureFlags> = Arc::new(ConfigFeatureFlags::from_config(notify));
        let renderer = Arc::new(
            EmailRenderer::new(schema.clone(), &config.email).with_unsubscribe(cipher.clone()),
        );
        let retry = RetryPolicy::from_config(&config.digest);

        let preferences = PreferenceService::new(
            stores.preferences.clone(),
            stores.directory.clone(),
            stores.catalog.clone(),
            schema.clone(),
            notify.preference_read_batch_size,
            notify.account_preferences_dual_write,
        );
        let engine = EmailDecisionEngine::new(
            stores.notifications.clone(),
            stores.jobs.clone(),
            stores.directory.clone(),
            renderer.clone(),
            mailer.clone(),
            events.clone(),
            notify.notification_immediate_email_buffer_minutes,
            retry.max_attempts(),
        );
        let digests = DigestService::new(
            stores.notifications.clone(),
            preferences.clone(),
            stores.directory.clone(),
            renderer.clone(),
            mailer,
            flags.clone(),
            events.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            stores.notifications.clone(),
            stores.directory.clone(),
            preferences.clone(),
            Arc::new(GroupingRegistry::builtin()),
            engine.clone(),
            flags,
            events.clone(),
            schema.clone(),
            notify.notification_creation_batch_size,
        );
        let notifications = NotificationService::new(
            stores.notifications.clone(),
            events.clone(),
            schema.clone(),
            renderer,
            notify.notification_expiry_days,
            notify.show_tray,
        );
        let retention = RetentionService::new(
            stores.notifications.clone(),
            notify.notification_expiry_days,
            notify.expired_notifications_delete_batch_size,
        );
        let unsubscribe = UnsubscribeService::new(
            cipher.clone(),
            stores.directory.clone(),
            preferences.clone(),
            events.clone(),
        );

        Self {
            schema,
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

    /// Handler state for the HTTP layer.
    pub fn app_state(&self, config: Arc<AppConfig>) -> AppState {
        let limiter = RateLimiter::new(
            config.unsubscribe.max_requests,
            config.unsubscribe.refill_per_second,
        );
        AppState {
            jwt: Arc::new(JwtDecoder::new(&config.auth)),
            preferences: self.preferences.clone(),
            notifications: self.notifications.clone(),
            unsubscribe: self.unsubscribe.clone(),
            unsubscribe_limiter: limiter,
            config,
        }
    }
}

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Runs the HTTP server and, when enabled, the background worker and cron
/// scheduler until a shutdown signal arrives.
pub async fn run_server(config: AppConfig, stores: Stores) -> Result<(), AppError> {
    tracing::info!("Starting notification server v{}", env!("CARGO_PKG_VERSION"));

    let mailer = mailer_from_config(&config.email)?;
    let services = Services::build(&config, &stores, mailer);
    tracing::info!(
        apps = services.schema.apps.len(),
        "Preference schema loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background worker ────────────────────────────────────────
    let worker = if config.worker.enabled {
        let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let retry = RetryPolicy::from_config(&config.digest);
        let queue = Arc::new(JobQueue::new(stores.jobs.clone(), worker_id.clone()));
        let executor = Arc::new(notify_worker::jobs::default_executor(
            services.digests.clone(),
            services.retention.clone(),
        ));
        let runner = WorkerRunner::new(queue.clone(), executor, config.worker.clone(), retry);

        let scheduler = CronScheduler::new(queue, config.digest.clone(), retry.max_attempts()).await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;

        let cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(cancel).await;
        });
        tracing::info!(worker_id = %worker_id, "Background worker started");
        Some((handle, scheduler))
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── HTTP server ──────────────────────────────────────────────
    let config = Arc::new(config);
    let app = build_app(services.app_state(config.clone()));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Notification server listening on {}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let served = server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")));

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Some((handle, scheduler)) = worker {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
        let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker did not stop within {}s", grace.as_secs());
        }
    }

    tracing::info!("Shutdown complete");
    served
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::{Duration as ChronoDuration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use notify_core::types::{CourseKey, UserId};
    use notify_entity::user::{CourseSummary, UserProfile};
    use notify_service::MemoryMailer;

    use crate::auth::{Claims, JwtEncoder};

    const CONFIG: &str = r#"
        [database]
        url = "postgres://localhost/notify"

        [auth]
        jwt_secret = "api-test-secret"

        [unsubscribe]
        secret = "api-test-unsubscribe"
        max_requests = 2
        refill_per_second = 0.0
    "#;

    const COURSE: &str = "course-v1:Org+CS101+2026";

    struct TestApp {
        store: MemoryStore,
        services: Services,
        app: Router,
        encoder: JwtEncoder,
    }

    async fn test_app() -> TestApp {
        let config = AppConfig::from_toml(CONFIG).expect("config");
        let store = MemoryStore::new();
        store
            .insert_course(CourseSummary {
                course_id: CourseKey::new(COURSE),
                display_name: "Intro to Computing".to_string(),
            })
            .await;
        let services = Services::build(
            &config,
            &Stores::memory(&store),
            Arc::new(MemoryMailer::new()),
        );
        let encoder = JwtEncoder::new(&config.auth);
        let app = build_app(services.app_state(Arc::new(config)));
        TestApp {
            store,
            services,
            app,
            encoder,
        }
    }

    impl TestApp {
        async fn learner(&self, username: &str) -> UserProfile {
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

        fn token(&self, user: &UserProfile) -> String {
            let claims = Claims::new(user.id, &user.username, Utc::now(), ChronoDuration::hours(1));
            self.encoder.encode(&claims).expect("encode")
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.expect("response");
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .expect("body")
                .to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).expect("json body")
            };
            (status, body)
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).expect("request")
    }

    fn with_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app().await;
        let (status, body) = app.send(get("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_configuration_requires_token() {
        let app = test_app().await;
        let (status, body) = app
            .send(get(&format!("/api/configurations/{COURSE}"), None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "AUTHENTICATION");
    }

    #[tokio::test]
    async fn test_get_configuration_returns_course_config() {
        let app = test_app().await;
        let user = app.learner("ada").await;
        let (status, body) = app
            .send(get(
                &format!("/api/configurations/{COURSE}"),
                Some(&app.token(&user)),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["course_id"], COURSE);
        assert_eq!(body["course_name"], "Intro to Computing");
        assert!(body["notification_preference_config"]["discussion"].is_object());
    }

    #[tokio::test]
    async fn test_patch_with_stale_version_conflicts() {
        let app = test_app().await;
        let user = app.learner("grace").await;
        let token = app.token(&user);
        let (status, body) = app
            .send(with_json(
                "PATCH",
                &format!("/api/configurations/{COURSE}"),
                &token,
                json!({
                    "notification_app": "discussion",
                    "notification_type": "new_response",
                    "notification_channel": "web",
                    "value": false,
                    "config_version": -1
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "STALE_CONFIG_VERSION");
    }

    #[tokio::test]
    async fn test_patch_unknown_app_is_bad_request() {
        let app = test_app().await;
        let user = app.learner("linus").await;
        let (status, body) = app
            .send(with_json(
                "PATCH",
                &format!("/api/configurations/{COURSE}"),
                &app.token(&user),
                json!({
                    "notification_app": "gradebook",
                    "notification_type": "core",
                    "notification_channel": "web",
                    "value": true
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "UNKNOWN_APP");
    }

    #[tokio::test]
    async fn test_patch_applies_and_reads_back() {
        let app = test_app().await;
        let user = app.learner("barbara").await;
        let token = app.token(&user);
        let (status, body) = app
            .send(with_json(
                "PATCH",
                &format!("/api/configurations/{COURSE}"),
                &token,
                json!({
                    "notification_app": "discussion",
                    "notification_type": "new_response",
                    "notification_channel": "email_cadence",
                    "value": "Weekly"
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let discussion = &body["notification_preference_config"]["discussion"];
        assert!(
            discussion["core_notification_types"]
                .as_array()
                .expect("core types")
                .contains(&json!("new_response"))
        );
        assert_eq!(discussion["notification_types"]["core"]["email_cadence"], "Weekly");
        assert!(discussion["notification_types"].get("new_response").is_none());
    }

    #[tokio::test]
    async fn test_count_for_new_user_is_zero() {
        let app = test_app().await;
        let user = app.learner("katherine").await;
        let (status, body) = app
            .send(get("/api/count", Some(&app.token(&user))))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_undecodable_token_is_accepted() {
        let app = test_app().await;
        let (status, body) = app
            .send(get("/api/preferences-unsubscribe/not-a-token", None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully unsubscribed");
    }

    #[tokio::test]
    async fn test_unsubscribe_rate_limited_per_token() {
        let app = test_app().await;
        for _ in 0..2 {
            let (status, _) = app
                .send(get("/api/preferences-unsubscribe/same-token", None))
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = app
            .send(get("/api/preferences-unsubscribe/same-token", None))
            .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "RATE_LIMIT");

        let (status, _) = app
            .send(get("/api/preferences-unsubscribe/other-token", None))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unsubscribe_all_disables_email() {
        let app = test_app().await;
        let user = app.learner("margaret").await;
        let bearer = app.token(&user);
        let config_uri = format!("/api/configurations/{COURSE}");
        let (status, _) = app.send(get(&config_uri, Some(&bearer))).await;
        assert_eq!(status, StatusCode::OK);

        let token = app
            .services
            .cipher
            .encrypt_str(&user.username)
            .expect("encrypt");
        let (status, _) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/preferences-unsubscribe/{token}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.send(get(&config_uri, Some(&bearer))).await;
        assert_eq!(
            body["notification_preference_config"]["discussion"]["notification_types"]["core"]
                ["email"],
            false
        );
    }
}
