//! Route definitions for the notification HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};
use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and the request logging middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(preference_routes())
        .merge(notification_routes())
        .merge(unsubscribe_routes())
        .route("/health", get(handlers::health::health));

    Router::new()
        .nest("/api", api_routes)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Per-course configuration and account aggregate
fn preference_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/configurations/{course_id}",
            get(handlers::preference::get_configuration)
                .patch(handlers::preference::patch_configuration),
        )
        .route(
            "/preferences/update-all",
            post(handlers::preference::update_all),
        )
        .route("/aggregate", get(handlers::preference::aggregate))
}

/// Tray listing, counts, read and seen
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::notification::list_notifications),
        )
        .route("/count", get(handlers::notification::count))
        .route(
            "/notifications/read",
            patch(handlers::notification::mark_read),
        )
        .route(
            "/notifications/{app_name}/seen",
            patch(handlers::notification::mark_seen),
        )
}

/// One-click unsubscribe links
fn unsubscribe_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/preferences-unsubscribe/{username_token}",
            get(handlers::unsubscribe::unsubscribe_all).post(handlers::unsubscribe::unsubscribe_all),
        )
        .route(
            "/preferences-unsubscribe/{username_token}/{patch_token}",
            get(handlers::unsubscribe::unsubscribe_scoped)
                .post(handlers::unsubscribe::unsubscribe_scoped),
        )
}
