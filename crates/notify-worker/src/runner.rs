//! Worker runner: main loop that polls for jobs and executes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, watch};
use tokio::time;

use notify_core::config::{DigestConfig, WorkerConfig};
use notify_core::result::AppResult;
use notify_entity::job::Job;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::JobQueue;

/// Exponential backoff between attempts of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplier applied per further attempt.
    pub factor: u32,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Build the policy from the digest settings.
    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            base: Duration::from_secs(config.retry_base_seconds),
            factor: config.retry_factor,
            max_retries: config.max_retries,
        }
    }

    /// Total attempts a job may take, the first one included.
    pub fn max_attempts(&self) -> i32 {
        i32::try_from(self.max_retries.saturating_add(1)).unwrap_or(i32::MAX)
    }

    /// Delay after the `attempts`-th failed attempt.
    pub fn delay_after(&self, attempts: i32) -> chrono::Duration {
        let exponent = u32::try_from(attempts.saturating_sub(1)).unwrap_or(0);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        let delay = self.base.saturating_mul(multiplier);
        chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DigestConfig::default())
    }
}

/// Main worker runner that polls queues and executes jobs.
#[derive(Debug)]
pub struct WorkerRunner {
    queue: Arc<JobQueue>,
    executor: Arc<JobExecutor>,
    config: WorkerConfig,
    retry: RetryPolicy,
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner.
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        retry: RetryPolicy,
    ) -> Self {
        let queues = config.queues.clone();
        Self {
            queue,
            executor,
            config,
            retry,
            queues,
        }
    }

    /// Run until the cancel signal is received.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.queue.worker_id(),
            concurrency = self.config.concurrency,
            poll_interval = self.config.poll_interval_seconds,
            queues = ?self.queues,
            "Worker started"
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!(worker_id = %self.queue.worker_id(), "Worker received shutdown signal");
                        break;
                    }
                }
                claimed = self.poll_and_execute(&semaphore) => {
                    if claimed {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                tracing::info!(worker_id = %self.queue.worker_id(), "Worker shutting down");
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.queue.worker_id(), "Waiting for in-flight jobs to complete");
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        let drain = Duration::from_secs(self.config.drain_timeout_seconds);
        if time::timeout(drain, semaphore.acquire_many(permits)).await.is_err() {
            tracing::warn!(
                worker_id = %self.queue.worker_id(),
                timeout_seconds = self.config.drain_timeout_seconds,
                "In-flight jobs still running at shutdown"
            );
        }
        tracing::info!(worker_id = %self.queue.worker_id(), "Worker shut down complete");
    }

    /// Claim and execute at most one due job inline.
    ///
    /// Returns whether a job was claimed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<bool> {
        let queue_refs: Vec<&str> = self.queues.iter().map(String::as_str).collect();
        let Some(job) = self.queue.dequeue(&queue_refs, now).await? else {
            return Ok(false);
        };
        let outcome = self.executor.execute(&job).await;
        settle(&self.queue, self.retry, &job, outcome, now).await;
        Ok(true)
    }

    /// Drain every job due at `now`; returns how many were executed.
    pub async fn drain(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut executed = 0;
        while self.run_once(now).await? {
            executed += 1;
        }
        Ok(executed)
    }

    /// Poll for a job and spawn its execution; returns whether one was claimed.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
            tracing::trace!("All worker slots occupied");
            return false;
        };

        let queue_refs: Vec<&str> = self.queues.iter().map(String::as_str).collect();
        match self.queue.dequeue(&queue_refs, Utc::now()).await {
            Ok(Some(job)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);
                let retry = self.retry;
                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = executor.execute(&job).await;
                    settle(&queue, retry, &job, outcome, Utc::now()).await;
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No jobs available in queues");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to dequeue job");
                false
            }
        }
    }
}

/// Record the outcome of one attempt: complete, reschedule or fail.
async fn settle(
    queue: &JobQueue,
    retry: RetryPolicy,
    job: &Job,
    outcome: Result<Option<serde_json::Value>, JobExecutionError>,
    now: DateTime<Utc>,
) {
    let job_id = job.id;
    let err = match outcome {
        Ok(result) => {
            if let Err(e) = queue.complete(job_id, result.as_ref(), now).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as completed");
            }
            tracing::info!(job_id = %job_id, job_type = %job.job_type, "Job completed successfully");
            return;
        }
        Err(err) => err,
    };

    let message = err.to_string();
    if err.is_retryable() && job.can_retry() {
        let run_at = now + retry.delay_after(job.attempts);
        tracing::warn!(
            job_id = %job_id,
            job_type = %job.job_type,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            run_at = %run_at,
            error = %message,
            "Job failed, retrying"
        );
        if let Err(e) = queue.reschedule(job_id, &message, run_at, now).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to reschedule job");
        }
        return;
    }

    tracing::error!(
        job_id = %job_id,
        job_type = %job.job_type,
        attempt = job.attempts,
        error = %message,
        "Job failed permanently"
    );
    if let Err(e) = queue.fail(job_id, &message, now).await {
        tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
    }
}
