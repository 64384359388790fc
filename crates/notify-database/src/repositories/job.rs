//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::JobId;
use notify_entity::job::{CreateJob, Job, JobStatus};

use crate::store::JobStore;

/// Repository for background job queue operations.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Clean up old finished jobs.
    pub async fn cleanup_old(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to cleanup jobs", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn enqueue(&self, data: &CreateJob) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (job_type, queue, priority, payload, max_attempts, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&data.job_type)
        .bind(&data.queue)
        .bind(data.priority)
        .bind(&data.payload)
        .bind(data.max_attempts)
        .bind(data.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to create job", e))
    }

    async fn dequeue(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'running', started_at = $3, worker_id = $2, \
             attempts = attempts + 1, updated_at = $3 \
             WHERE id = ( \
                SELECT id FROM jobs \
                WHERE queue = $1 AND status = 'pending' \
                AND (scheduled_at IS NULL OR scheduled_at <= $3) \
                ORDER BY \
                    CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 END, \
                    COALESCE(scheduled_at, created_at) ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(queue)
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to dequeue job", e))
    }

    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find job", e))
    }

    async fn find_jobs(&self, job_type: &str, status: JobStatus) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE job_type = $1 AND status = $2 ORDER BY created_at",
        )
        .bind(job_type)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list jobs", e))
    }

    async fn complete(
        &self,
        id: JobId,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'completed', result = $2, completed_at = $3, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to complete job", e))?;
        Ok(())
    }

    async fn fail(&self, id: JobId, error_message: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error_message = $2, completed_at = $3, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to mark job as failed", e))?;
        Ok(())
    }

    async fn reschedule(
        &self,
        id: JobId,
        error_message: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'pending', error_message = $2, scheduled_at = $3, \
             started_at = NULL, worker_id = NULL, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .bind(run_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to reschedule job", e))?;
        Ok(())
    }

    async fn status_counts(&self) -> AppResult<Vec<(String, JobStatus, i64)>> {
        sqlx::query_as::<_, (String, JobStatus, i64)>(
            "SELECT queue, status, COUNT(*) FROM jobs GROUP BY queue, status ORDER BY queue, status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to count jobs", e))
    }
}
