//! Request context carrying the authenticated caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notify_core::types::UserId;

/// Context for the current authenticated request.
///
/// Built by the API layer from the bearer token and passed into service
/// methods so that every operation knows *who* is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: UserId,
    /// The username from the token claims.
    pub username: String,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context stamped with the current time.
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            request_time: Utc::now(),
        }
    }

    /// Creates a context with an explicit request time.
    pub fn at(user_id: UserId, username: impl Into<String>, request_time: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: username.into(),
            request_time,
        }
    }
}
