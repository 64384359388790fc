//! One-click unsubscribe settings.

use serde::{Deserialize, Serialize};

/// Token secret and request throttling for the unsubscribe endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeConfig {
    /// Secret the token encryption key is derived from.
    pub secret: String,
    /// Burst size per token.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Tokens refilled per second.
    #[serde(default = "default_refill")]
    pub refill_per_second: f64,
}

fn default_max_requests() -> u32 {
    5
}

fn default_refill() -> f64 {
    0.1
}
