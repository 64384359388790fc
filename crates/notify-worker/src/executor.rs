//! Job executor: dispatches claimed jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use notify_core::error::{AppError, ErrorKind};
use notify_entity::job::{Job, JobPayload};

/// A handler for one job type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job type this handler processes.
    fn job_type(&self) -> &str;

    /// Execute the job; the returned value is stored as the job result.
    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure; do not retry.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure; retry with backoff.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Classify a service error.
    ///
    /// Bad input never succeeds on retry; transport and storage conflicts
    /// may.
    pub fn classify(err: AppError) -> Self {
        match err.kind {
            ErrorKind::Validation
            | ErrorKind::InvalidContext
            | ErrorKind::UnknownType
            | ErrorKind::UnknownApp
            | ErrorKind::Serialization => Self::Permanent(err.to_string()),
            _ if err.is_transient() => Self::Transient(err.to_string()),
            _ => Self::Internal(err),
        }
    }

    /// Whether the runner may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Decode a job's typed payload or fail permanently.
pub fn payload_of(job: &Job) -> Result<JobPayload, JobExecutionError> {
    job.typed_payload().map_err(|e| {
        JobExecutionError::Permanent(format!("Invalid payload for job {}: {e}", job.id))
    })
}

/// Dispatches jobs to the handler registered for their type.
#[derive(Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("job_types", &self.registered_types())
            .finish()
    }
}

impl JobExecutor {
    /// Create an executor without handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Execute a job with its handler.
    pub async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&job.job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                job.job_type
            ))
        })?;

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Executing job"
        );
        handler.execute(job).await
    }

    /// Whether a handler is registered for a job type.
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
