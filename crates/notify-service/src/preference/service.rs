//! Preference reads and writes on behalf of users and producers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_database::store::{CourseCatalog, PreferenceStore, UserDirectory};
use notify_entity::preference::{
    AccountPreferenceValues, AggregatedConfig, CORE_TYPE_KEY, Channel, ConfigMigration,
    CoursePreference, EmailCadence, PreferenceConfig, PreferenceUpdate, UnsubscribePatch,
};
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::CourseRole;

use super::aggregate::aggregate;
use super::patch::{apply_unsubscribe, apply_update, target_entry};
use super::sync::{needs_sync, sync};
use super::visibility::{filter_visible, merge_info};
use crate::context::RequestContext;

/// Per-course configuration as returned to the user.
#[derive(Debug, Clone, Serialize)]
pub struct CourseConfiguration {
    /// The course.
    pub course_id: CourseKey,
    /// Course display name.
    pub course_name: String,
    /// Version the stored config was written against.
    pub config_version: i32,
    /// Visible entries with help text merged in.
    pub notification_preference_config: PreferenceConfig,
}

/// Account-level view across every active course.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatePreferences {
    /// Whether the user has any course to configure.
    pub show_preferences: bool,
    /// The aggregated config.
    pub data: AggregatedConfig,
}

/// A course that rejected an update-all change.
#[derive(Debug, Clone, Serialize)]
pub struct CourseUpdateError {
    /// The course.
    pub course_id: CourseKey,
    /// Why the update failed.
    pub error: String,
}

/// Outcome of applying one change to every active course.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateAllResult {
    /// Courses that were updated.
    pub updated_courses: Vec<CourseKey>,
    /// Courses that failed.
    pub errors: Vec<CourseUpdateError>,
    /// Number of courses attempted.
    pub total: usize,
    /// Number of courses updated.
    pub success_count: usize,
}

/// Reads, migrates and mutates notification preferences.
#[derive(Clone)]
pub struct PreferenceService {
    prefs: Arc<dyn PreferenceStore>,
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn CourseCatalog>,
    schema: Arc<PreferenceSchema>,
    read_batch_size: usize,
    dual_write: bool,
}

impl PreferenceService {
    /// Creates a new preference service.
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn CourseCatalog>,
        schema: Arc<PreferenceSchema>,
        read_batch_size: usize,
        dual_write: bool,
    ) -> Self {
        Self {
            prefs,
            directory,
            catalog,
            schema,
            read_batch_size: read_batch_size.max(1),
            dual_write,
        }
    }

    /// The schema configs are validated against.
    pub fn schema(&self) -> &PreferenceSchema {
        &self.schema
    }

    /// Get or create a user's preference for a course, migrated to the
    /// current schema version.
    pub async fn get_for(&self, user_id: UserId, course_id: &CourseKey) -> AppResult<CoursePreference> {
        self.get_for_at(user_id, course_id, Utc::now()).await
    }

    /// [`get_for`](Self::get_for) at an explicit time.
    pub async fn get_for_at(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        now: DateTime<Utc>,
    ) -> AppResult<CoursePreference> {
        let row = match self.prefs.find_course_preference(user_id, course_id).await? {
            Some(row) => row,
            None => self
                .create_defaults(&[user_id], course_id, now)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::internal("Preference row missing after creation"))?,
        };
        self.synchronized(row, now).await
    }

    /// Load the configs of many users in one course, creating missing rows.
    ///
    /// Reads and creations run in batches of the configured read size.
    pub async fn preferences_for(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
        now: DateTime<Utc>,
    ) -> AppResult<HashMap<UserId, PreferenceConfig>> {
        let mut configs = HashMap::with_capacity(user_ids.len());
        for batch in user_ids.chunks(self.read_batch_size) {
            let mut rows = self.prefs.find_course_preferences(batch, course_id).await?;
            let found: HashSet<UserId> = rows.iter().map(|row| row.user_id).collect();
            let missing: HashSet<UserId> = batch
                .iter()
                .filter(|user_id| !found.contains(user_id))
                .copied()
                .collect();
            if !missing.is_empty() {
                let missing_ids: Vec<UserId> = missing.iter().copied().collect();
                let created = self.create_defaults(&missing_ids, course_id, now).await?;
                rows.extend(created.into_iter().filter(|row| missing.contains(&row.user_id)));
            }
            for row in self.synchronized_all(rows, now).await? {
                configs.insert(row.user_id, self.decode(&row));
            }
        }
        Ok(configs)
    }

    /// The caller's configuration for a course.
    pub async fn configuration(
        &self,
        ctx: &RequestContext,
        course_id: &CourseKey,
    ) -> AppResult<CourseConfiguration> {
        let row = self
            .get_for_at(ctx.user_id, course_id, ctx.request_time)
            .await?;
        let config = self.decode(&row);
        let roles = self.course_roles(ctx.user_id, course_id).await?;
        self.present(course_id, row.config_version, config, &roles)
            .await
    }

    /// Apply one change to the caller's configuration for a course.
    ///
    /// Fails with `StaleConfigVersion` when the stored config is not at the
    /// current schema version, when `expected_version` differs from it, or
    /// when a concurrent writer replaced it first.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        course_id: &CourseKey,
        update: &PreferenceUpdate,
        expected_version: Option<i32>,
    ) -> AppResult<CourseConfiguration> {
        let now = ctx.request_time;
        let row = self.get_for_at(ctx.user_id, course_id, now).await?;
        if row.config_version != self.schema.version
            || expected_version.is_some_and(|v| v != row.config_version)
        {
            return Err(AppError::stale_config_version(format!(
                "Preference config version {} does not match {}",
                expected_version.unwrap_or(row.config_version),
                self.schema.version
            )));
        }

        let roles = self.course_roles(ctx.user_id, course_id).await?;
        if let Some(definition) = self.schema.notification_type(update.notification_type()) {
            if !definition.visible_for(&roles) {
                return Err(AppError::unknown_type(update.notification_type()));
            }
        }

        let mut config = self.decode(&row);
        apply_update(&mut config, update)?;
        let stored = self
            .prefs
            .update_course_config(
                row.id,
                &config.to_value()?,
                row.config_version,
                self.schema.version,
                now,
            )
            .await?;
        if !stored {
            return Err(AppError::stale_config_version(
                "Preference config was modified concurrently",
            ));
        }

        info!(
            user_id = %ctx.user_id,
            course_key = %course_id,
            app = update.app(),
            notification_type = update.notification_type(),
            "Notification preference updated"
        );

        if self.dual_write {
            let entry = target_entry(&config, update.app(), update.notification_type());
            let values = account_values(&config, update.app(), &entry);
            if let Err(err) = self
                .prefs
                .upsert_account_preferences(ctx.user_id, &values, now)
                .await
            {
                warn!(user_id = %ctx.user_id, error = %err, "Account preference dual-write failed");
            }
        }

        self.present(course_id, self.schema.version, config, &roles)
            .await
    }

    /// Apply one change to every active course of the caller.
    pub async fn update_all(
        &self,
        ctx: &RequestContext,
        update: &PreferenceUpdate,
    ) -> AppResult<UpdateAllResult> {
        let rows = self.prefs.active_course_preferences(ctx.user_id).await?;
        let total = rows.len();
        let mut updated_courses = Vec::new();
        let mut errors = Vec::new();
        for row in rows {
            match self.update(ctx, &row.course_id, update, None).await {
                Ok(_) => updated_courses.push(row.course_id),
                Err(err) => errors.push(CourseUpdateError {
                    course_id: row.course_id,
                    error: err.message,
                }),
            }
        }
        Ok(UpdateAllResult {
            success_count: updated_courses.len(),
            updated_courses,
            errors,
            total,
        })
    }

    /// The caller's account-level view across all active courses.
    pub async fn aggregate(&self, ctx: &RequestContext) -> AppResult<AggregatePreferences> {
        let configs = self.active_configs(ctx.user_id, ctx.request_time).await?;
        let mut data = aggregate(&configs, &self.schema);
        let roles = self.directory.roles_anywhere(ctx.user_id).await?;
        filter_visible(&mut data, &self.schema, &roles);
        merge_info(&mut data, &self.schema);
        Ok(AggregatePreferences {
            show_preferences: !configs.is_empty(),
            data,
        })
    }

    /// Walk a user's course preferences into account rows.
    ///
    /// Divergent cadences are stored as `Daily`.
    pub async fn migrate_account_preferences(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let configs = self.active_configs(user_id, now).await?;
        if configs.is_empty() {
            return Ok(0);
        }
        let view = aggregate(&configs, &self.schema);
        let mut values = Vec::new();
        for (app_name, app) in &view.apps {
            for (entry, pref) in &app.notification_types {
                let names: Vec<&str> = if entry == CORE_TYPE_KEY {
                    app.core_notification_types.iter().map(String::as_str).collect()
                } else {
                    vec![entry.as_str()]
                };
                for name in names {
                    values.push(AccountPreferenceValues {
                        app: app_name.clone(),
                        notification_type: name.to_string(),
                        web: pref.web,
                        email: pref.email,
                        push: pref.push,
                        email_cadence: pref.email_cadence.concrete().unwrap_or(EmailCadence::Daily),
                    });
                }
            }
        }
        let written = self
            .prefs
            .upsert_account_preferences(user_id, &values, now)
            .await?;
        info!(user_id = %user_id, rows = written, "Account preferences migrated");
        Ok(written)
    }

    /// Apply an unsubscribe patch to course and account preferences.
    ///
    /// Returns the number of course config entries that changed.
    pub async fn unsubscribe(
        &self,
        user_id: UserId,
        patch: &UnsubscribePatch,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut changed = 0;
        let rows: Vec<CoursePreference> = self
            .prefs
            .active_course_preferences(user_id)
            .await?
            .into_iter()
            .filter(|row| patch.course_id.as_ref().is_none_or(|c| c == &row.course_id))
            .collect();
        for row in self.synchronized_all(rows, now).await? {
            let mut config = self.decode(&row);
            let touched = apply_unsubscribe(&mut config, patch);
            if touched.is_empty() {
                continue;
            }
            let stored = self
                .prefs
                .update_course_config(
                    row.id,
                    &config.to_value()?,
                    row.config_version,
                    row.config_version,
                    now,
                )
                .await?;
            if stored {
                changed += touched.len();
            } else {
                warn!(user_id = %user_id, course_key = %row.course_id, "Unsubscribe lost a concurrent update");
            }
        }

        let values = self.unsubscribed_account_values(user_id, patch).await?;
        if !values.is_empty() {
            self.prefs
                .upsert_account_preferences(user_id, &values, now)
                .await?;
        }
        Ok(changed)
    }

    async fn unsubscribed_account_values(
        &self,
        user_id: UserId,
        patch: &UnsubscribePatch,
    ) -> AppResult<Vec<AccountPreferenceValues>> {
        let existing: HashMap<(String, String), AccountPreferenceValues> = self
            .prefs
            .account_preferences(user_id)
            .await?
            .into_iter()
            .map(|row| {
                (
                    (row.app.clone(), row.notification_type.clone()),
                    AccountPreferenceValues {
                        app: row.app,
                        notification_type: row.notification_type,
                        web: row.web,
                        email: row.email,
                        push: row.push,
                        email_cadence: row.email_cadence,
                    },
                )
            })
            .collect();

        // Naming one core type disables the shared core entry, so every core
        // type of that app follows it.
        let core_app = patch
            .notification_type
            .as_deref()
            .and_then(|name| self.schema.notification_type(name))
            .filter(|definition| definition.is_core)
            .map(|definition| definition.app.as_str());

        let mut values = Vec::new();
        for definition in &self.schema.types {
            let in_scope = patch.matches(&definition.app, &definition.name)
                || (definition.is_core
                    && (patch.matches(&definition.app, CORE_TYPE_KEY)
                        || (core_app == Some(definition.app.as_str())
                            && patch.app_name.as_deref().is_none_or(|a| a == definition.app))));
            if !in_scope {
                continue;
            }
            let locked = if definition.is_core {
                self.schema
                    .app(&definition.app)
                    .map(|app| app.non_editable.clone())
                    .unwrap_or_default()
            } else {
                definition.non_editable.clone()
            };
            let mut row = existing
                .get(&(definition.app.clone(), definition.name.clone()))
                .cloned()
                .unwrap_or_else(|| {
                    AccountPreferenceValues::from_type(
                        &definition.app,
                        &definition.name,
                        &self.schema.type_defaults(definition),
                    )
                });
            for channel in patch.channels() {
                if !locked.contains(&channel) {
                    set_channel(&mut row, channel, patch.value);
                }
            }
            values.push(row);
        }
        Ok(values)
    }

    async fn active_configs(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PreferenceConfig>> {
        let rows = self.prefs.active_course_preferences(user_id).await?;
        let rows = self.synchronized_all(rows, now).await?;
        Ok(rows.iter().map(|row| self.decode(row)).collect())
    }

    async fn create_defaults(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<CoursePreference>> {
        let defaults = self.schema.default_config().to_value()?;
        self.prefs
            .create_course_preferences(user_ids, course_id, &defaults, self.schema.version, now)
            .await
    }

    /// Migrate a row if its version is outdated.
    async fn synchronized(
        &self,
        row: CoursePreference,
        now: DateTime<Utc>,
    ) -> AppResult<CoursePreference> {
        self.synchronized_all(vec![row], now)
            .await?
            .pop()
            .ok_or_else(|| AppError::internal("Preference row lost during migration"))
    }

    /// Migrate outdated rows in memory and persist them with one write.
    ///
    /// Rows whose migration fails, or whose write fails, are returned stale;
    /// the next read retries. Rows another reader migrated first are re-read.
    async fn synchronized_all(
        &self,
        rows: Vec<CoursePreference>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<CoursePreference>> {
        let mut migrations = Vec::new();
        for row in rows.iter().filter(|row| needs_sync(row.config_version, &self.schema)) {
            let migrated = sync(&row.notification_preference_config, &self.schema)
                .and_then(|config| config.to_value().map_err(AppError::from));
            match migrated {
                Ok(config) => migrations.push(ConfigMigration {
                    id: row.id,
                    expected_version: row.config_version,
                    config,
                }),
                Err(err) => warn!(
                    user_id = %row.user_id,
                    course_key = %row.course_id,
                    error = %err,
                    "Preference config migration failed"
                ),
            }
        }
        if migrations.is_empty() {
            return Ok(rows);
        }

        let written: HashSet<i64> = match self
            .prefs
            .migrate_course_configs(&migrations, self.schema.version, now)
            .await
        {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                warn!(
                    rows = migrations.len(),
                    error = %err,
                    "Persisting migrated preference configs failed"
                );
                return Ok(rows);
            }
        };
        let mut migrated: HashMap<i64, serde_json::Value> = migrations
            .into_iter()
            .map(|migration| (migration.id, migration.config))
            .collect();

        let mut synced = Vec::with_capacity(rows.len());
        for mut row in rows {
            let Some(config) = migrated.remove(&row.id) else {
                synced.push(row);
                continue;
            };
            if !written.contains(&row.id) {
                // Another reader migrated it first.
                let current = self
                    .prefs
                    .find_course_preference(row.user_id, &row.course_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Preference row disappeared during migration"))?;
                synced.push(current);
                continue;
            }
            info!(
                user_id = %row.user_id,
                course_key = %row.course_id,
                from = row.config_version,
                to = self.schema.version,
                "Preference config migrated"
            );
            row.notification_preference_config = config;
            row.config_version = self.schema.version;
            row.modified = now;
            synced.push(row);
        }
        Ok(synced)
    }

    fn decode(&self, row: &CoursePreference) -> PreferenceConfig {
        row.config()
            .or_else(|_| sync(&row.notification_preference_config, &self.schema))
            .unwrap_or_else(|err| {
                warn!(
                    user_id = %row.user_id,
                    course_key = %row.course_id,
                    error = %err,
                    "Unreadable preference config, using defaults"
                );
                self.schema.default_config()
            })
    }

    async fn present(
        &self,
        course_id: &CourseKey,
        config_version: i32,
        mut config: PreferenceConfig,
        roles: &[CourseRole],
    ) -> AppResult<CourseConfiguration> {
        filter_visible(&mut config, &self.schema, roles);
        merge_info(&mut config, &self.schema);
        Ok(CourseConfiguration {
            course_id: course_id.clone(),
            course_name: self.course_name(course_id).await?,
            config_version,
            notification_preference_config: config,
        })
    }

    async fn course_roles(&self, user_id: UserId, course_id: &CourseKey) -> AppResult<Vec<CourseRole>> {
        Ok(self
            .directory
            .roles_in_course(&[user_id], course_id)
            .await?
            .remove(&user_id)
            .unwrap_or_default())
    }

    async fn course_name(&self, course_id: &CourseKey) -> AppResult<String> {
        Ok(self
            .catalog
            .find_course(course_id)
            .await?
            .map(|course| course.display_name)
            .unwrap_or_else(|| course_id.to_string()))
    }
}

/// Account rows for one config entry; `core` expands to every core type.
fn account_values(config: &PreferenceConfig, app: &str, entry: &str) -> Vec<AccountPreferenceValues> {
    let Some(app_pref) = config.app(app) else {
        return Vec::new();
    };
    let Some(pref) = app_pref.notification_types.get(entry) else {
        return Vec::new();
    };
    if entry == CORE_TYPE_KEY {
        app_pref
            .core_notification_types
            .iter()
            .map(|name| AccountPreferenceValues::from_type(app, name, pref))
            .collect()
    } else {
        vec![AccountPreferenceValues::from_type(app, entry, pref)]
    }
}

fn set_channel(values: &mut AccountPreferenceValues, channel: Channel, value: bool) {
    match channel {
        Channel::Web => values.web = value,
        Channel::Email => values.email = value,
        Channel::Push => values.push = value,
    }
}
