//! Notification repository implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, NotificationId, PageRequest, PageResponse, UserId};
use notify_entity::notification::{
    DecisionFn, DeleteFilter, EmailAction, EmailWindow, ListFilter, NewNotification, Notification,
};

use crate::store::{EmailDecision, NotificationStore, ReadOutcome};

const INSERT_COLUMNS: &str = "INSERT INTO notifications (user_id, course_id, app_name, notification_type, \
     content_context, content_url, web, email, group_by_id, created) ";

/// Repository for notification rows.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn bulk_create(
        &self,
        records: &[NewNotification],
        batch_size: usize,
    ) -> AppResult<Vec<Notification>> {
        let mut created = Vec::with_capacity(records.len());
        for batch in records.chunks(batch_size.max(1)) {
            let mut builder = QueryBuilder::<Postgres>::new(INSERT_COLUMNS);
            builder.push_values(batch, |mut row, record| {
                row.push_bind(record.user_id)
                    .push_bind(record.course_id.clone())
                    .push_bind(record.app_name.clone())
                    .push_bind(record.notification_type.clone())
                    .push_bind(serde_json::Value::Object(record.content_context.clone()))
                    .push_bind(record.content_url.clone())
                    .push_bind(record.web)
                    .push_bind(record.email)
                    .push_bind(record.group_by_id.clone())
                    .push_bind(record.created);
            });
            builder.push(" RETURNING *");
            let rows = builder
                .build_query_as::<Notification>()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to insert notifications", e))?;
            created.extend(rows);
        }
        Ok(created)
    }

    async fn find_notification(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find notification", e))
    }

    async fn find_groupable(
        &self,
        user_ids: &[UserId],
        notification_type: &str,
        group_by_id: &str,
        course_id: &CourseKey,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT DISTINCT ON (user_id) * FROM notifications \
             WHERE user_id = ANY($1) AND notification_type = $2 AND group_by_id = $3 \
             AND course_id = $4 AND last_read IS NULL \
             ORDER BY user_id, created DESC, id DESC",
        )
        .bind(user_ids)
        .bind(notification_type)
        .bind(group_by_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to find groupable notifications", e))
    }

    async fn save_grouped(&self, notification: &Notification) -> AppResult<()> {
        sqlx::query(
            "UPDATE notifications SET content_context = $2, web = $3, email = $4, \
             last_read = $5, last_seen = $6, created = $7 WHERE id = $1",
        )
        .bind(notification.id)
        .bind(&notification.content_context)
        .bind(notification.web)
        .bind(notification.email)
        .bind(notification.last_read)
        .bind(notification.last_seen)
        .bind(notification.created)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to save grouped notification", e))?;
        Ok(())
    }

    async fn list_for(
        &self,
        user_id: UserId,
        filter: &ListFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<Notification>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 AND web AND created > $2 AND ($3::text IS NULL OR app_name = $3)",
        )
        .bind(user_id)
        .bind(filter.expiry_cutoff)
        .bind(filter.app_name.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to count notifications", e))?;

        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE user_id = $1 AND web AND created > $2 AND ($3::text IS NULL OR app_name = $3) \
             ORDER BY created DESC, id DESC LIMIT $4 OFFSET $5",
        )
        .bind(user_id)
        .bind(filter.expiry_cutoff)
        .bind(filter.app_name.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list notifications", e))?;

        Ok(PageResponse::new(rows, page, total as u64))
    }

    async fn count_unseen(
        &self,
        user_id: UserId,
        expiry_cutoff: DateTime<Utc>,
    ) -> AppResult<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT app_name, COUNT(*) FROM notifications \
             WHERE user_id = $1 AND web AND last_seen IS NULL AND created > $2 \
             GROUP BY app_name",
        )
        .bind(user_id)
        .bind(expiry_cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to count unseen notifications", e))?;
        Ok(rows.into_iter().collect())
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ReadOutcome>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin transaction", e))?;

        let current = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load notification", e))?;

        let Some(current) = current else {
            return Ok(None);
        };
        if current.last_read.is_some() {
            return Ok(Some(ReadOutcome {
                notification: current,
                first_read: false,
            }));
        }

        let updated = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET last_read = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to mark notification read", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to commit read mark", e))?;

        Ok(Some(ReadOutcome {
            notification: updated,
            first_read: true,
        }))
    }

    async fn mark_app_read(
        &self,
        user_id: UserId,
        app_name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET last_read = $3 \
             WHERE user_id = $1 AND app_name = $2 AND last_read IS NULL",
        )
        .bind(user_id)
        .bind(app_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to mark notifications read", e))?;
        Ok(result.rows_affected())
    }

    async fn mark_seen(&self, user_id: UserId, app_name: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET last_seen = $3 \
             WHERE user_id = $1 AND app_name = $2 AND last_seen IS NULL",
        )
        .bind(user_id)
        .bind(app_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to mark notifications seen", e))?;
        Ok(result.rows_affected())
    }

    async fn decide_email(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        notification_id: NotificationId,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
        decide: DecisionFn,
    ) -> AppResult<EmailDecision> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin email decision", e))?;

        // Serializes deciders for the window even when their row sets are disjoint.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("notifications:{user_id}:{course_id}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to lock email window", e))?;

        let rows: Vec<(Option<DateTime<Utc>>, bool)> = sqlx::query_as(
            "SELECT email_sent_on, email_scheduled FROM notifications \
             WHERE user_id = $1 AND course_id = $2 AND created >= $3 \
             ORDER BY id FOR UPDATE",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(threshold)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to read email window", e))?;

        let window = EmailWindow::observe(rows, threshold);
        let action = decide(&window);

        let update = match action {
            EmailAction::SendImmediate => {
                sqlx::query("UPDATE notifications SET email_sent_on = $2 WHERE id = $1")
                    .bind(notification_id)
                    .bind(now)
            }
            EmailAction::ScheduleBuffer | EmailAction::AddToBuffer => {
                sqlx::query("UPDATE notifications SET email_scheduled = TRUE WHERE id = $1")
                    .bind(notification_id)
            }
        };
        update
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to apply email decision", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to commit email decision", e))?;

        Ok(EmailDecision { action, window })
    }

    async fn scheduled_in_window(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE user_id = $1 AND course_id = $2 AND email_scheduled \
             AND created >= $3 AND created <= $4 ORDER BY created, id",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load buffered notifications", e))
    }

    async fn mark_emailed(&self, ids: &[NotificationId], now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET email_sent_on = $2, email_scheduled = FALSE WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to record email send", e))?;
        Ok(result.rows_affected())
    }

    async fn clear_emailed(&self, ids: &[NotificationId]) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET email_sent_on = NULL WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to clear email send", e))?;
        Ok(result.rows_affected())
    }

    async fn clear_scheduled(&self, ids: &[NotificationId]) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET email_scheduled = FALSE WHERE id = ANY($1)")
                .bind(ids)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to clear buffered flag", e))?;
        Ok(result.rows_affected())
    }

    async fn digest_audience(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT DISTINCT user_id FROM notifications \
             WHERE email AND email_sent_on IS NULL AND created >= $1 AND created <= $2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load digest audience", e))
    }

    async fn digest_candidates(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE user_id = $1 AND email AND email_sent_on IS NULL \
             AND created >= $2 AND created <= $3 ORDER BY created, id",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load digest notifications", e))
    }

    async fn delete_expired_batch(&self, cutoff: DateTime<Utc>, batch_size: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE id IN ( \
                SELECT id FROM notifications WHERE created <= $1 ORDER BY id LIMIT $2 \
             )",
        )
        .bind(cutoff)
        .bind(batch_size)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to delete expired notifications", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_matching_batch(&self, filter: &DeleteFilter, batch_size: i64) -> AppResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "DELETE FROM notifications WHERE id IN (SELECT id FROM notifications WHERE created >= ",
        );
        builder.push_bind(filter.created.gte);
        builder.push(" AND created <= ").push_bind(filter.created.lte);
        if let Some(app_name) = &filter.app_name {
            builder.push(" AND app_name = ").push_bind(app_name.clone());
        }
        if let Some(notification_type) = &filter.notification_type {
            builder
                .push(" AND notification_type = ")
                .push_bind(notification_type.clone());
        }
        if let Some(course_id) = &filter.course_id {
            builder.push(" AND course_id = ").push_bind(course_id.clone());
        }
        builder.push(" ORDER BY id LIMIT ").push_bind(batch_size).push(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to delete notifications", e))?;
        Ok(result.rows_affected())
    }
}
