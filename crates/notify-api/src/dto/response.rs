//! Response DTOs.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
}

/// Answer of the unsubscribe endpoint; identical for every outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    /// Status message.
    pub message: String,
}

impl UnsubscribeResponse {
    /// The fixed success answer.
    pub fn accepted() -> Self {
        Self {
            message: "Successfully unsubscribed".to_string(),
        }
    }
}
