//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notify_core::types::JobId;

use super::payload::JobPayload;
use super::status::{JobPriority, JobStatus};

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Job type identifier (e.g., `"send_digest"`, `"send_buffered_digest"`).
    pub job_type: String,
    /// Queue name.
    pub queue: String,
    /// Job priority.
    pub priority: JobPriority,
    /// Job-specific payload (JSON).
    pub payload: serde_json::Value,
    /// Result data on completion (JSON).
    pub result: Option<serde_json::Value>,
    /// Error message of the last failed attempt.
    pub error_message: Option<String>,
    /// Current job status.
    pub status: JobStatus,
    /// Number of execution attempts.
    pub attempts: i32,
    /// Maximum allowed attempts.
    pub max_attempts: i32,
    /// Earliest execution time (None = immediate).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the job started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Worker ID that picked up the job.
    pub worker_id: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Check if another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Decode the typed payload.
    pub fn typed_payload(&self) -> Result<JobPayload, serde_json::Error> {
        let mut value = self.payload.clone();
        if let serde_json::Value::Object(map) = &mut value {
            map.entry("job_type")
                .or_insert_with(|| serde_json::Value::String(self.job_type.clone()));
        }
        serde_json::from_value(value)
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Job type identifier.
    pub job_type: String,
    /// Queue name.
    pub queue: String,
    /// Priority.
    pub priority: JobPriority,
    /// Job-specific payload.
    pub payload: serde_json::Value,
    /// Maximum attempts including the first.
    pub max_attempts: i32,
    /// Earliest execution time.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreateJob {
    /// Build a job from a typed payload.
    pub fn from_payload(
        payload: &JobPayload,
        max_attempts: i32,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            job_type: payload.job_type().to_string(),
            queue: payload.queue().to_string(),
            priority: payload.priority(),
            payload: serde_json::to_value(payload)?,
            max_attempts,
            scheduled_at,
        })
    }
}
