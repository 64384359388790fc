//! # notify-entity
//!
//! Domain entity models for the notification delivery core. Every struct in
//! this crate represents a database table row or a domain value object.
//! Database entities additionally derive `sqlx::FromRow`.

pub mod job;
pub mod notification;
pub mod preference;
pub mod schema;
pub mod user;
