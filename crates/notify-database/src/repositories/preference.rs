//! Course and account preference repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_entity::preference::{
    AccountPreference, AccountPreferenceValues, ConfigMigration, CoursePreference,
};

use crate::store::PreferenceStore;

/// Repository for preference rows.
#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    /// Create a new preference repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn find_course_preference(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
    ) -> AppResult<Option<CoursePreference>> {
        sqlx::query_as::<_, CoursePreference>(
            "SELECT * FROM course_notification_preferences WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to find course preference", e))
    }

    async fn find_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<Vec<CoursePreference>> {
        sqlx::query_as::<_, CoursePreference>(
            "SELECT * FROM course_notification_preferences \
             WHERE user_id = ANY($1) AND course_id = $2",
        )
        .bind(user_ids)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load course preferences", e))
    }

    async fn create_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
        config: &serde_json::Value,
        config_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<CoursePreference>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO course_notification_preferences \
             (user_id, course_id, notification_preference_config, config_version, is_active, created, modified) ",
        );
        builder.push_values(user_ids, |mut row, user_id| {
            row.push_bind(*user_id)
                .push_bind(course_id.clone())
                .push_bind(config.clone())
                .push_bind(config_version)
                .push_bind(true)
                .push_bind(now)
                .push_bind(now);
        });
        builder.push(" ON CONFLICT (user_id, course_id) DO NOTHING");
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to create course preferences", e))?;

        self.find_course_preferences(user_ids, course_id).await
    }

    async fn update_course_config(
        &self,
        id: i64,
        config: &serde_json::Value,
        expected_version: i32,
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE course_notification_preferences \
             SET notification_preference_config = $2, config_version = $4, modified = $5 \
             WHERE id = $1 AND config_version = $3",
        )
        .bind(id)
        .bind(config)
        .bind(expected_version)
        .bind(new_version)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to update course preference", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn migrate_course_configs(
        &self,
        migrations: &[ConfigMigration],
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        if migrations.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = migrations.iter().map(|m| m.id).collect();
        let versions: Vec<i32> = migrations.iter().map(|m| m.expected_version).collect();
        let configs: Vec<serde_json::Value> = migrations.iter().map(|m| m.config.clone()).collect();
        sqlx::query_scalar::<_, i64>(
            "UPDATE course_notification_preferences AS p \
             SET notification_preference_config = u.config, config_version = $4, modified = $5 \
             FROM unnest($1::bigint[], $2::int[], $3::jsonb[]) AS u(id, old_version, config) \
             WHERE p.id = u.id AND p.config_version = u.old_version \
             RETURNING p.id",
        )
        .bind(&ids)
        .bind(&versions)
        .bind(&configs)
        .bind(new_version)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to migrate course preferences", e))
    }

    async fn active_course_preferences(&self, user_id: UserId) -> AppResult<Vec<CoursePreference>> {
        sqlx::query_as::<_, CoursePreference>(
            "SELECT * FROM course_notification_preferences \
             WHERE user_id = $1 AND is_active ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list course preferences", e))
    }

    async fn account_preferences(&self, user_id: UserId) -> AppResult<Vec<AccountPreference>> {
        sqlx::query_as::<_, AccountPreference>(
            "SELECT * FROM account_notification_preferences WHERE user_id = $1 ORDER BY app, type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list account preferences", e))
    }

    async fn upsert_account_preferences(
        &self,
        user_id: UserId,
        values: &[AccountPreferenceValues],
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO account_notification_preferences \
             (user_id, app, type, web, email, push, email_cadence, created, modified) ",
        );
        builder.push_values(values, |mut row, value| {
            row.push_bind(user_id)
                .push_bind(value.app.clone())
                .push_bind(value.notification_type.clone())
                .push_bind(value.web)
                .push_bind(value.email)
                .push_bind(value.push)
                .push_bind(value.email_cadence)
                .push_bind(now)
                .push_bind(now);
        });
        builder.push(
            " ON CONFLICT (user_id, app, type) DO UPDATE SET web = EXCLUDED.web, \
             email = EXCLUDED.email, push = EXCLUDED.push, \
             email_cadence = EXCLUDED.email_cadence, modified = EXCLUDED.modified",
        );
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to upsert account preferences", e))?;
        Ok(result.rows_affected())
    }
}
