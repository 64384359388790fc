//! Job queue wrapper over the persistent `JobStore`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::JobId;
use notify_database::store::JobStore;
use notify_entity::job::{CreateJob, Job, JobPayload, JobStatus};

/// Job queue for enqueuing and claiming work.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    worker_id: String,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

impl JobQueue {
    /// Create a queue that claims jobs as `worker_id`.
    pub fn new(store: Arc<dyn JobStore>, worker_id: impl Into<String>) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
        }
    }

    /// Worker identifier used when claiming.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueue a typed job.
    pub async fn enqueue(
        &self,
        payload: &JobPayload,
        max_attempts: i32,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> AppResult<Job> {
        let create = CreateJob::from_payload(payload, max_attempts, scheduled_at)?;
        let job = self.store.enqueue(&create).await?;

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            queue = %job.queue,
            priority = ?job.priority,
            "Enqueued job"
        );
        Ok(job)
    }

    /// Claim the next due job from the given queues, in order.
    pub async fn dequeue(&self, queues: &[&str], now: DateTime<Utc>) -> AppResult<Option<Job>> {
        for queue in queues {
            if let Some(job) = self.store.dequeue(queue, &self.worker_id, now).await? {
                tracing::debug!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    queue = %job.queue,
                    "Dequeued job"
                );
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// Mark a job as completed.
    pub async fn complete(
        &self,
        job_id: JobId,
        result: Option<&Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.store.complete(job_id, result, now).await?;
        tracing::debug!(job_id = %job_id, "Job completed");
        Ok(())
    }

    /// Mark a job as failed for good.
    pub async fn fail(&self, job_id: JobId, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.store.fail(job_id, error, now).await?;
        tracing::debug!(job_id = %job_id, error = %error, "Job failed");
        Ok(())
    }

    /// Return a job to pending, due at `run_at`.
    pub async fn reschedule(
        &self,
        job_id: JobId,
        error: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.store.reschedule(job_id, error, run_at, now).await?;
        tracing::debug!(job_id = %job_id, run_at = %run_at, "Job rescheduled");
        Ok(())
    }

    /// Look up a job.
    pub async fn find(&self, job_id: JobId) -> AppResult<Job> {
        self.store
            .find_job(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))
    }

    /// Queue statistics.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        let mut stats = QueueStats {
            worker_id: self.worker_id.clone(),
            ..QueueStats::default()
        };
        for (queue, status, count) in self.store.status_counts().await? {
            match status {
                JobStatus::Pending => stats.pending += count,
                JobStatus::Running => stats.running += count,
                JobStatus::Completed => stats.completed += count,
                JobStatus::Failed => stats.failed += count,
            }
            stats.by_queue.push(QueueCount {
                queue,
                status,
                count,
            });
        }
        Ok(stats)
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of pending jobs
    pub pending: i64,
    /// Number of running jobs
    pub running: i64,
    /// Number of completed jobs
    pub completed: i64,
    /// Number of failed jobs
    pub failed: i64,
    /// Counts per queue and status
    pub by_queue: Vec<QueueCount>,
    /// Current worker identifier
    pub worker_id: String,
}

/// Job count of one (queue, status) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCount {
    /// Queue name
    pub queue: String,
    /// Job status
    pub status: JobStatus,
    /// Number of jobs
    pub count: i64,
}
