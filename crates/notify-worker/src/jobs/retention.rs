//! Notification retention job handlers.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use notify_entity::job::payload::{DELETE_EXPIRED_NOTIFICATIONS, DELETE_NOTIFICATIONS};
use notify_entity::job::{Job, JobPayload};
use notify_service::RetentionService;

use crate::executor::{JobExecutionError, JobHandler, payload_of};

/// Deletes notifications past the retention window.
pub struct DeleteExpiredJobHandler {
    retention: RetentionService,
}

impl DeleteExpiredJobHandler {
    /// Create a new expiry reaper handler
    pub fn new(retention: RetentionService) -> Self {
        Self { retention }
    }
}

#[async_trait]
impl JobHandler for DeleteExpiredJobHandler {
    fn job_type(&self) -> &str {
        DELETE_EXPIRED_NOTIFICATIONS
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let deleted = self
            .retention
            .delete_expired(Utc::now())
            .await
            .map_err(JobExecutionError::classify)?;

        tracing::info!(job_id = %job.id, deleted, "Expired notifications removed");
        Ok(Some(serde_json::json!({
            "task": DELETE_EXPIRED_NOTIFICATIONS,
            "deleted": deleted,
        })))
    }
}

/// Operator bulk delete by filter.
pub struct DeleteNotificationsJobHandler {
    retention: RetentionService,
}

impl DeleteNotificationsJobHandler {
    /// Create a new bulk delete handler
    pub fn new(retention: RetentionService) -> Self {
        Self { retention }
    }
}

#[async_trait]
impl JobHandler for DeleteNotificationsJobHandler {
    fn job_type(&self) -> &str {
        DELETE_NOTIFICATIONS
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let JobPayload::DeleteNotifications { filter } = payload_of(job)? else {
            return Err(JobExecutionError::Permanent(format!(
                "Job {} does not carry a delete filter",
                job.id
            )));
        };

        let deleted = self
            .retention
            .delete_notifications(&filter)
            .await
            .map_err(JobExecutionError::classify)?;

        tracing::info!(job_id = %job.id, deleted, filter = ?filter, "Notifications deleted");
        Ok(Some(serde_json::json!({
            "task": DELETE_NOTIFICATIONS,
            "deleted": deleted,
        })))
    }
}
