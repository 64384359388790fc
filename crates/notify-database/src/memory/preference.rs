use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_entity::preference::{
    AccountPreference, AccountPreferenceValues, ConfigMigration, CoursePreference,
};

use super::MemoryStore;
use crate::store::PreferenceStore;

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn find_course_preference(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
    ) -> AppResult<Option<CoursePreference>> {
        self.round_trip();
        let table = self.tables.course_preferences.read().await;
        Ok(table
            .values()
            .find(|p| p.user_id == user_id && &p.course_id == course_id)
            .cloned())
    }

    async fn find_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<Vec<CoursePreference>> {
        self.round_trip();
        let table = self.tables.course_preferences.read().await;
        Ok(table
            .values()
            .filter(|p| &p.course_id == course_id && user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }

    async fn create_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
        config: &serde_json::Value,
        config_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<CoursePreference>> {
        self.round_trip();
        let mut table = self.tables.course_preferences.write().await;
        for user_id in user_ids {
            let exists = table
                .values()
                .any(|p| p.user_id == *user_id && &p.course_id == course_id);
            if exists {
                continue;
            }
            let id = self.next_row_id();
            table.insert(
                id,
                CoursePreference {
                    id,
                    user_id: *user_id,
                    course_id: course_id.clone(),
                    notification_preference_config: config.clone(),
                    config_version,
                    is_active: true,
                    created: now,
                    modified: now,
                },
            );
        }
        Ok(table
            .values()
            .filter(|p| &p.course_id == course_id && user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }

    async fn update_course_config(
        &self,
        id: i64,
        config: &serde_json::Value,
        expected_version: i32,
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.round_trip();
        let mut table = self.tables.course_preferences.write().await;
        match table.get_mut(&id) {
            Some(row) if row.config_version == expected_version => {
                row.notification_preference_config = config.clone();
                row.config_version = new_version;
                row.modified = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn migrate_course_configs(
        &self,
        migrations: &[ConfigMigration],
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        self.round_trip();
        let mut table = self.tables.course_preferences.write().await;
        let mut written = Vec::with_capacity(migrations.len());
        for migration in migrations {
            if let Some(row) = table.get_mut(&migration.id) {
                if row.config_version == migration.expected_version {
                    row.notification_preference_config = migration.config.clone();
                    row.config_version = new_version;
                    row.modified = now;
                    written.push(migration.id);
                }
            }
        }
        Ok(written)
    }

    async fn active_course_preferences(&self, user_id: UserId) -> AppResult<Vec<CoursePreference>> {
        self.round_trip();
        let table = self.tables.course_preferences.read().await;
        Ok(table
            .values()
            .filter(|p| p.user_id == user_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn account_preferences(&self, user_id: UserId) -> AppResult<Vec<AccountPreference>> {
        let table = self.tables.account_preferences.read().await;
        Ok(table
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_account_preferences(
        &self,
        user_id: UserId,
        values: &[AccountPreferenceValues],
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut table = self.tables.account_preferences.write().await;
        for value in values {
            let key = (user_id, value.app.clone(), value.notification_type.clone());
            match table.get_mut(&key) {
                Some(row) => {
                    row.web = value.web;
                    row.email = value.email;
                    row.push = value.push;
                    row.email_cadence = value.email_cadence;
                    row.modified = now;
                }
                None => {
                    let row = AccountPreference {
                        id: self.next_row_id(),
                        user_id,
                        app: value.app.clone(),
                        notification_type: value.notification_type.clone(),
                        web: value.web,
                        email: value.email,
                        push: value.push,
                        email_cadence: value.email_cadence,
                        created: now,
                        modified: now,
                    };
                    table.insert(key, row);
                }
            }
        }
        Ok(values.len() as u64)
    }
}
