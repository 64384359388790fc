//! Bearer token configuration.

use serde::{Deserialize, Serialize};

/// Settings for validating the platform-issued access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the token issuer.
    pub jwt_secret: String,
    /// Expected `iss` claim, if the issuer sets one.
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// Allowed clock skew in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

fn default_leeway() -> u64 {
    5
}
