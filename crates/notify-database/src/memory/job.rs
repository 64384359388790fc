use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notify_core::result::AppResult;
use notify_core::types::JobId;
use notify_entity::job::{CreateJob, Job, JobStatus};

use super::MemoryStore;
use crate::store::JobStore;

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, data: &CreateJob) -> AppResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            job_type: data.job_type.clone(),
            queue: data.queue.clone(),
            priority: data.priority,
            payload: data.payload.clone(),
            result: None,
            error_message: None,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: data.max_attempts,
            scheduled_at: data.scheduled_at,
            started_at: None,
            completed_at: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn dequeue(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let mut table = self.tables.jobs.write().await;
        let next = table
            .values()
            .filter(|job| {
                job.queue == queue
                    && job.status == JobStatus::Pending
                    && job.scheduled_at.is_none_or(|at| at <= now)
            })
            .min_by_key(|job| {
                (
                    job.priority.rank(),
                    job.scheduled_at.unwrap_or(job.created_at),
                )
            })
            .map(|job| job.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(job) = table.get_mut(&id) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.worker_id = Some(worker_id.to_string());
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.tables.jobs.read().await.get(&id).cloned())
    }

    async fn find_jobs(&self, job_type: &str, status: JobStatus) -> AppResult<Vec<Job>> {
        let table = self.tables.jobs.read().await;
        let mut jobs: Vec<Job> = table
            .values()
            .filter(|job| job.job_type == job_type && job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn complete(
        &self,
        id: JobId,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(job) = self.tables.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Completed;
            job.result = result.cloned();
            job.completed_at = Some(now);
            job.updated_at = now;
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, error_message: &str, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(job) = self.tables.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.error_message = Some(error_message.to_string());
            job.completed_at = Some(now);
            job.updated_at = now;
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        id: JobId,
        error_message: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(job) = self.tables.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Pending;
            job.error_message = Some(error_message.to_string());
            job.scheduled_at = Some(run_at);
            job.started_at = None;
            job.worker_id = None;
            job.updated_at = now;
        }
        Ok(())
    }

    async fn status_counts(&self) -> AppResult<Vec<(String, JobStatus, i64)>> {
        let table = self.tables.jobs.read().await;
        let mut counts: std::collections::BTreeMap<(String, &'static str), (JobStatus, i64)> =
            std::collections::BTreeMap::new();
        for job in table.values() {
            let entry = counts
                .entry((job.queue.clone(), job.status.as_str()))
                .or_insert((job.status, 0));
            entry.1 += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((queue, _), (status, count))| (queue, status, count))
            .collect())
    }
}
