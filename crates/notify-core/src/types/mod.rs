//! Core type definitions used across the workspace.

pub mod id;
pub mod pagination;

pub use id::{CourseKey, JobId, NotificationId, UserId};
pub use pagination::{PageRequest, PageResponse};
