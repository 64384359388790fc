//! Cron scheduler for the digest and retention tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use notify_core::config::DigestConfig;
use notify_core::error::AppError;
use notify_entity::job::JobPayload;
use notify_entity::preference::EmailCadence;

use crate::queue::JobQueue;

/// Cron-based scheduler that enqueues periodic jobs.
pub struct CronScheduler {
    scheduler: JobScheduler,
    queue: Arc<JobQueue>,
    config: DigestConfig,
    max_attempts: i32,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("daily_cron", &self.config.daily_cron)
            .field("weekly_cron", &self.config.weekly_cron)
            .field("reaper_cron", &self.config.reaper_cron)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler.
    pub async fn new(
        queue: Arc<JobQueue>,
        config: DigestConfig,
        max_attempts: i32,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            queue,
            config,
            max_attempts,
        })
    }

    /// Register the daily digest, weekly digest and expiry reaper.
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        let daily = self.config.daily_cron.clone();
        let weekly = self.config.weekly_cron.clone();
        let reaper = self.config.reaper_cron.clone();

        self.register(
            "daily_digest",
            &daily,
            JobPayload::SendDigest {
                cadence: EmailCadence::Daily,
            },
        )
        .await?;
        self.register(
            "weekly_digest",
            &weekly,
            JobPayload::SendDigest {
                cadence: EmailCadence::Weekly,
            },
        )
        .await?;
        self.register("expiry_reaper", &reaper, JobPayload::DeleteExpiredNotifications)
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shut the scheduler down.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Enqueue `payload` every time `expression` fires.
    async fn register(
        &self,
        name: &'static str,
        expression: &str,
        payload: JobPayload,
    ) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let max_attempts = self.max_attempts;
        let job = CronJob::new_async(expression, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let payload = payload.clone();
            Box::pin(async move {
                tracing::debug!(task = name, "Scheduling periodic job");
                if let Err(e) = queue.enqueue(&payload, max_attempts, None).await {
                    tracing::error!(task = name, error = %e, "Failed to enqueue periodic job");
                }
            })
        })
        .map_err(|e| AppError::configuration(format!("Invalid cron expression for {name}: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {name} schedule: {e}")))?;

        tracing::info!(task = name, cron = %expression, "Registered scheduled task");
        Ok(())
    }
}
