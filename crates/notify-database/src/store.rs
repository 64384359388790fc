//! Storage traits consumed by the service layer.
//!
//! Every method that depends on the current time takes it as an argument so
//! callers control the clock.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notify_core::result::AppResult;
use notify_core::types::{CourseKey, JobId, NotificationId, PageRequest, PageResponse, UserId};
use notify_entity::job::{CreateJob, Job, JobStatus};
use notify_entity::notification::{
    DecisionFn, DeleteFilter, EmailAction, EmailWindow, ListFilter, NewNotification, Notification,
};
use notify_entity::preference::{
    AccountPreference, AccountPreferenceValues, ConfigMigration, CoursePreference,
};
use notify_entity::user::{CourseRole, CourseSummary, UserProfile};

/// Result of an email decision taken under the window lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailDecision {
    /// The action that was applied.
    pub action: EmailAction,
    /// The window state the action was derived from.
    pub window: EmailWindow,
}

/// Outcome of marking a single notification read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    /// The notification after the update.
    pub notification: Notification,
    /// Whether this call moved it from unread to read.
    pub first_read: bool,
}

/// Persistence of in-app notifications and their email state.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert records in batches of at most `batch_size` rows.
    async fn bulk_create(
        &self,
        records: &[NewNotification],
        batch_size: usize,
    ) -> AppResult<Vec<Notification>>;

    /// Find a notification by id.
    async fn find_notification(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Latest unread notification per user matching `(type, group_by_id, course)`.
    async fn find_groupable(
        &self,
        user_ids: &[UserId],
        notification_type: &str,
        group_by_id: &str,
        course_id: &CourseKey,
    ) -> AppResult<Vec<Notification>>;

    /// Persist a regrouped notification: context, channels, timestamps.
    async fn save_grouped(&self, notification: &Notification) -> AppResult<()>;

    /// Page through a user's visible notifications, newest first.
    async fn list_for(
        &self,
        user_id: UserId,
        filter: &ListFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<Notification>>;

    /// Unseen web notifications per app, excluding expired ones.
    async fn count_unseen(
        &self,
        user_id: UserId,
        expiry_cutoff: DateTime<Utc>,
    ) -> AppResult<BTreeMap<String, i64>>;

    /// Mark one owned notification read. `None` if absent or not owned.
    async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ReadOutcome>>;

    /// Mark every unread notification of an app read.
    async fn mark_app_read(&self, user_id: UserId, app_name: &str, now: DateTime<Utc>)
    -> AppResult<u64>;

    /// Mark unseen notifications of an app seen.
    async fn mark_seen(&self, user_id: UserId, app_name: &str, now: DateTime<Utc>) -> AppResult<u64>;

    /// Lock the `(user, course)` window created at or after `threshold`,
    /// evaluate `decide` against it and apply the action to `notification_id`
    /// in the same transaction.
    async fn decide_email(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        notification_id: NotificationId,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
        decide: DecisionFn,
    ) -> AppResult<EmailDecision>;

    /// Notifications flagged for a buffered digest in `[start, end]`.
    async fn scheduled_in_window(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// Set `email_sent_on = now` and clear `email_scheduled`.
    async fn mark_emailed(&self, ids: &[NotificationId], now: DateTime<Utc>) -> AppResult<u64>;

    /// Clear `email_sent_on` after a send that did not go out.
    async fn clear_emailed(&self, ids: &[NotificationId]) -> AppResult<u64>;

    /// Clear `email_scheduled` without recording a send.
    async fn clear_scheduled(&self, ids: &[NotificationId]) -> AppResult<u64>;

    /// Distinct users with unsent email notifications in `[start, end]`.
    async fn digest_audience(&self, start: DateTime<Utc>, end: DateTime<Utc>)
    -> AppResult<Vec<UserId>>;

    /// A user's unsent email notifications in `[start, end]`, oldest first.
    async fn digest_candidates(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// Delete up to `batch_size` notifications created at or before `cutoff`.
    async fn delete_expired_batch(&self, cutoff: DateTime<Utc>, batch_size: i64) -> AppResult<u64>;

    /// Delete up to `batch_size` notifications matching `filter`.
    async fn delete_matching_batch(&self, filter: &DeleteFilter, batch_size: i64) -> AppResult<u64>;
}

/// Persistence of course and account preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Find a user's preference row for one course.
    async fn find_course_preference(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
    ) -> AppResult<Option<CoursePreference>>;

    /// Find the preference rows of many users in one course.
    async fn find_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<Vec<CoursePreference>>;

    /// Insert default rows for users that have none; returns the rows that
    /// exist afterwards for these users.
    async fn create_course_preferences(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
        config: &serde_json::Value,
        config_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<CoursePreference>>;

    /// Replace a config if its stored version still equals `expected_version`.
    ///
    /// Returns `false` when another writer got there first.
    async fn update_course_config(
        &self,
        id: i64,
        config: &serde_json::Value,
        expected_version: i32,
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Persist many migrated configs in one write, each guarded by its
    /// expected version.
    ///
    /// Returns the ids of the rows that were written.
    async fn migrate_course_configs(
        &self,
        migrations: &[ConfigMigration],
        new_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>>;

    /// Active course preferences of a user.
    async fn active_course_preferences(&self, user_id: UserId) -> AppResult<Vec<CoursePreference>>;

    /// All account preference rows of a user.
    async fn account_preferences(&self, user_id: UserId) -> AppResult<Vec<AccountPreference>>;

    /// Insert or overwrite account preference rows.
    async fn upsert_account_preferences(
        &self,
        user_id: UserId,
        values: &[AccountPreferenceValues],
        now: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Persistent job queue.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job.
    async fn enqueue(&self, job: &CreateJob) -> AppResult<Job>;

    /// Claim the next due job of a queue (skipping rows locked by others).
    async fn dequeue(&self, queue: &str, worker_id: &str, now: DateTime<Utc>)
    -> AppResult<Option<Job>>;

    /// Find a job by id.
    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Jobs of one type in one status.
    async fn find_jobs(&self, job_type: &str, status: JobStatus) -> AppResult<Vec<Job>>;

    /// Mark a job completed.
    async fn complete(
        &self,
        id: JobId,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark a job failed for good.
    async fn fail(&self, id: JobId, error_message: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Put a job back to pending, due at `run_at`.
    async fn reschedule(
        &self,
        id: JobId,
        error_message: &str,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Job counts grouped by queue and status.
    async fn status_counts(&self) -> AppResult<Vec<(String, JobStatus, i64)>>;
}

/// Read access to platform users and their roles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id.
    async fn find_user(&self, id: UserId) -> AppResult<Option<UserProfile>>;

    /// Find a user by username.
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserProfile>>;

    /// Load many users in one query.
    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>>;

    /// Roles of many users in one course.
    async fn roles_in_course(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<HashMap<UserId, Vec<CourseRole>>>;

    /// Roles of a user across all courses.
    async fn roles_anywhere(&self, user_id: UserId) -> AppResult<Vec<CourseRole>>;
}

/// Course metadata lookup.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Find a course by key.
    async fn find_course(&self, course_id: &CourseKey) -> AppResult<Option<CourseSummary>>;
}
