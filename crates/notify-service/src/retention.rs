//! Batched deletion of expired and operator-selected notifications.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use notify_core::result::AppResult;
use notify_database::store::NotificationStore;
use notify_entity::notification::DeleteFilter;

/// Deletes notifications in bounded batches.
#[derive(Clone)]
pub struct RetentionService {
    notifications: Arc<dyn NotificationStore>,
    expiry_days: u32,
    batch_size: i64,
}

impl RetentionService {
    /// Creates a new retention service.
    pub fn new(notifications: Arc<dyn NotificationStore>, expiry_days: u32, batch_size: u32) -> Self {
        Self {
            notifications,
            expiry_days,
            batch_size: i64::from(batch_size.max(1)),
        }
    }

    /// Delete notifications created at or before `now - expiry_days`.
    ///
    /// Stops at the first batch that deletes nothing.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - Duration::days(i64::from(self.expiry_days));
        info!(cutoff = %cutoff, batch_size = self.batch_size, "Deleting expired notifications");
        let mut total = 0;
        let mut batch = 0;
        loop {
            let deleted = self
                .notifications
                .delete_expired_batch(cutoff, self.batch_size)
                .await?;
            if deleted == 0 {
                break;
            }
            batch += 1;
            total += deleted;
            info!(batch, deleted, "Expired notification batch deleted");
        }
        info!(total, "Expired notifications deleted");
        Ok(total)
    }

    /// Delete notifications matching an operator filter.
    pub async fn delete_notifications(&self, filter: &DeleteFilter) -> AppResult<u64> {
        filter.validate()?;
        let mut total = 0;
        loop {
            let deleted = self
                .notifications
                .delete_matching_batch(filter, self.batch_size)
                .await?;
            if deleted == 0 {
                break;
            }
            total += deleted;
            info!(
                deleted,
                app = ?filter.app_name,
                notification_type = ?filter.notification_type,
                course_key = ?filter.course_id,
                "Notification batch deleted"
            );
        }
        info!(total, "Matching notifications deleted");
        Ok(total)
    }
}
