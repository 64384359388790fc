//! # notify-api
//!
//! HTTP API layer for the notification delivery core built on Axum.
//!
//! Provides the preference, tray and unsubscribe endpoints, middleware
//! (request logging, CORS, rate limiting), extractors, DTOs, error mapping
//! and the wiring that assembles services, worker and server.

pub mod app;
pub mod auth;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{Services, Stores, build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
