//! Digest job handlers.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use notify_entity::job::payload::{SEND_BUFFERED_DIGEST, SEND_DIGEST};
use notify_entity::job::{Job, JobPayload};
use notify_service::DigestService;

use crate::executor::{JobExecutionError, JobHandler, payload_of};

/// Sends the daily or weekly digest to every eligible user.
pub struct DigestJobHandler {
    digests: DigestService,
}

impl DigestJobHandler {
    /// Create a new digest job handler
    pub fn new(digests: DigestService) -> Self {
        Self { digests }
    }
}

#[async_trait]
impl JobHandler for DigestJobHandler {
    fn job_type(&self) -> &str {
        SEND_DIGEST
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::SendDigest { cadence } = payload_of(job)? else {
            return Err(JobExecutionError::Permanent(format!(
                "Job {} does not carry a digest payload",
                job.id
            )));
        };

        let run = self
            .digests
            .send_digest(cadence, Utc::now())
            .await
            .map_err(JobExecutionError::classify)?;

        tracing::info!(
            job_id = %job.id,
            cadence = %cadence,
            audience = run.audience,
            sent = run.sent,
            skipped = run.skipped,
            failed = run.failed,
            "Digest run finished"
        );
        Ok(Some(serde_json::to_value(&run).map_err(|e| {
            JobExecutionError::Permanent(format!("Failed to encode digest result: {e}"))
        })?))
    }
}

/// Sends the buffered digest of one (user, course) window.
///
/// The payload only points at the window; the flagged notifications are
/// read back from the store when the job runs.
pub struct BufferedDigestJobHandler {
    digests: DigestService,
}

impl BufferedDigestJobHandler {
    /// Create a new buffered digest job handler
    pub fn new(digests: DigestService) -> Self {
        Self { digests }
    }
}

#[async_trait]
impl JobHandler for BufferedDigestJobHandler {
    fn job_type(&self) -> &str {
        SEND_BUFFERED_DIGEST
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::SendBufferedDigest {
            user_id,
            course_key,
            start_date,
            user_language,
        } = payload_of(job)?
        else {
            return Err(JobExecutionError::Permanent(format!(
                "Job {} does not carry a buffered digest payload",
                job.id
            )));
        };

        let outcome = self
            .digests
            .send_buffered_digest(user_id, &course_key, start_date, &user_language, Utc::now())
            .await
            .map_err(JobExecutionError::classify)?;

        tracing::info!(
            job_id = %job.id,
            user_id = %user_id,
            course_key = %course_key,
            outcome = ?outcome,
            "Buffered digest finished"
        );
        Ok(Some(serde_json::to_value(&outcome).map_err(|e| {
            JobExecutionError::Permanent(format!("Failed to encode digest result: {e}"))
        })?))
    }
}
