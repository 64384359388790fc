//! In-process store implementing every storage trait.
//!
//! Tables live behind `tokio` read-write locks. The email decision takes a
//! per-(user, course) mutex in place of the row lock PostgreSQL provides, so
//! the same serialization guarantees hold.

mod directory;
mod job;
mod notification;
mod preference;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use notify_core::error::{AppError, ErrorKind};
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, JobId, NotificationId, UserId};
use notify_entity::job::Job;
use notify_entity::notification::Notification;
use notify_entity::preference::{AccountPreference, CoursePreference};
use notify_entity::user::{CourseRole, CourseSummary, UserProfile};

type WindowKey = (UserId, CourseKey);
type AccountKey = (UserId, String, String);

#[derive(Debug, Default)]
struct Tables {
    notifications: RwLock<BTreeMap<NotificationId, Notification>>,
    course_preferences: RwLock<BTreeMap<i64, CoursePreference>>,
    account_preferences: RwLock<BTreeMap<AccountKey, AccountPreference>>,
    jobs: RwLock<BTreeMap<JobId, Job>>,
    users: RwLock<HashMap<UserId, UserProfile>>,
    roles: RwLock<Vec<(UserId, CourseKey, CourseRole)>>,
    courses: RwLock<HashMap<CourseKey, CourseSummary>>,
    window_locks: DashMap<WindowKey, Arc<Mutex<()>>>,
    next_notification_id: AtomicI64,
    next_row_id: AtomicI64,
    round_trips: AtomicU64,
    injected_decision_failures: AtomicU32,
}

/// Shared in-memory store; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub async fn insert_user(&self, user: UserProfile) {
        self.tables.users.write().await.insert(user.id, user);
    }

    /// Add or replace a course.
    pub async fn insert_course(&self, course: CourseSummary) {
        self.tables
            .courses
            .write()
            .await
            .insert(course.course_id.clone(), course);
    }

    /// Grant a role in a course.
    pub async fn grant_role(&self, user_id: UserId, course_id: CourseKey, role: CourseRole) {
        self.tables.roles.write().await.push((user_id, course_id, role));
    }

    /// Insert a fully specified notification, assigning a fresh id.
    pub async fn insert_notification(&self, mut notification: Notification) -> Notification {
        notification.id = self.next_notification_id();
        self.tables
            .notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        notification
    }

    /// Snapshot every stored notification, ordered by id.
    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.tables.notifications.read().await.values().cloned().collect()
    }

    /// Snapshot every stored job.
    pub async fn all_jobs(&self) -> Vec<Job> {
        self.tables.jobs.read().await.values().cloned().collect()
    }

    /// Overwrite a stored course preference row.
    pub async fn put_course_preference(&self, preference: CoursePreference) {
        self.tables
            .course_preferences
            .write()
            .await
            .insert(preference.id, preference);
    }

    /// Number of storage calls that would have been database round trips.
    pub fn round_trips(&self) -> u64 {
        self.tables.round_trips.load(Ordering::SeqCst)
    }

    /// Make the next `count` email decisions fail with a transient error.
    pub fn fail_next_decisions(&self, count: u32) {
        self.tables
            .injected_decision_failures
            .store(count, Ordering::SeqCst);
    }

    fn next_notification_id(&self) -> NotificationId {
        NotificationId(self.tables.next_notification_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_row_id(&self) -> i64 {
        self.tables.next_row_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn round_trip(&self) {
        self.tables.round_trips.fetch_add(1, Ordering::SeqCst);
    }

    fn window_lock(&self, user_id: UserId, course_id: &CourseKey) -> Arc<Mutex<()>> {
        self.tables
            .window_locks
            .entry((user_id, course_id.clone()))
            .or_default()
            .clone()
    }

    fn take_injected_failure(&self) -> AppResult<()> {
        let failures = &self.tables.injected_decision_failures;
        let taken = failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if taken {
            return Err(AppError::new(
                ErrorKind::TransientStorage,
                "could not serialize access due to concurrent update",
            ));
        }
        Ok(())
    }
}
