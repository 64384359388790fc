//! JWT claims structure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use notify_core::types::UserId;

/// JWT claims issued by the platform's identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: UserId,
    /// Username.
    pub username: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Claims valid for `ttl` from `now`.
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: user_id,
            username: username.into(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: None,
        }
    }

    /// Set the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = Some(issuer.into());
        self
    }
}
