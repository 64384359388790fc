//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use notify_core::config::AppConfig;
use notify_service::{NotificationService, PreferenceService, UnsubscribeService};

use crate::auth::JwtDecoder;
use crate::middleware::rate_limit::RateLimiter;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// Services clone cheaply; each holds `Arc` handles to its stores.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Bearer token validator
    pub jwt: Arc<JwtDecoder>,
    /// Preference reads and mutations
    pub preferences: PreferenceService,
    /// Tray listing and read/seen state
    pub notifications: NotificationService,
    /// One-click unsubscribe
    pub unsubscribe: UnsubscribeService,
    /// Per-token limiter for the unsubscribe endpoint
    pub unsubscribe_limiter: RateLimiter,
}
