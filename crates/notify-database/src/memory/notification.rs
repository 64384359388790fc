use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notify_core::result::AppResult;
use notify_core::types::{CourseKey, NotificationId, PageRequest, PageResponse, UserId};
use notify_entity::notification::{
    DecisionFn, DeleteFilter, EmailAction, EmailWindow, ListFilter, NewNotification, Notification,
};

use super::MemoryStore;
use crate::store::{EmailDecision, NotificationStore, ReadOutcome};

fn in_course(notification: &Notification, user_id: UserId, course_id: &CourseKey) -> bool {
    notification.user_id == user_id && notification.course_id.as_ref() == Some(course_id)
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn bulk_create(
        &self,
        records: &[NewNotification],
        batch_size: usize,
    ) -> AppResult<Vec<Notification>> {
        let mut created = Vec::with_capacity(records.len());
        for batch in records.chunks(batch_size.max(1)) {
            self.round_trip();
            let mut table = self.tables.notifications.write().await;
            for record in batch {
                let notification = Notification {
                    id: self.next_notification_id(),
                    user_id: record.user_id,
                    course_id: record.course_id.clone(),
                    app_name: record.app_name.clone(),
                    notification_type: record.notification_type.clone(),
                    content_context: serde_json::Value::Object(record.content_context.clone()),
                    content_url: record.content_url.clone(),
                    web: record.web,
                    email: record.email,
                    last_read: None,
                    last_seen: None,
                    group_by_id: record.group_by_id.clone(),
                    email_sent_on: None,
                    email_scheduled: false,
                    created: record.created,
                    email_content: None,
                };
                table.insert(notification.id, notification.clone());
                created.push(notification);
            }
        }
        Ok(created)
    }

    async fn find_notification(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        Ok(self.tables.notifications.read().await.get(&id).cloned())
    }

    async fn find_groupable(
        &self,
        user_ids: &[UserId],
        notification_type: &str,
        group_by_id: &str,
        course_id: &CourseKey,
    ) -> AppResult<Vec<Notification>> {
        self.round_trip();
        let wanted: BTreeSet<UserId> = user_ids.iter().copied().collect();
        let table = self.tables.notifications.read().await;
        let mut latest: HashMap<UserId, &Notification> = HashMap::new();
        for n in table.values().filter(|n| {
            wanted.contains(&n.user_id)
                && n.notification_type == notification_type
                && n.group_by_id == group_by_id
                && n.course_id.as_ref() == Some(course_id)
                && n.last_read.is_none()
        }) {
            let entry = latest.entry(n.user_id).or_insert(n);
            if (n.created, n.id) > (entry.created, entry.id) {
                *entry = n;
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn save_grouped(&self, notification: &Notification) -> AppResult<()> {
        if let Some(existing) = self
            .tables
            .notifications
            .write()
            .await
            .get_mut(&notification.id)
        {
            existing.content_context = notification.content_context.clone();
            existing.web = notification.web;
            existing.email = notification.email;
            existing.last_read = notification.last_read;
            existing.last_seen = notification.last_seen;
            existing.created = notification.created;
        }
        Ok(())
    }

    async fn list_for(
        &self,
        user_id: UserId,
        filter: &ListFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<Notification>> {
        let table = self.tables.notifications.read().await;
        let mut rows: Vec<Notification> = table
            .values()
            .filter(|n| {
                n.user_id == user_id
                    && n.web
                    && n.created > filter.expiry_cutoff
                    && filter
                        .app_name
                        .as_deref()
                        .is_none_or(|app| app == n.app_name)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
        let total = rows.len() as u64;
        let results = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(results, page, total))
    }

    async fn count_unseen(
        &self,
        user_id: UserId,
        expiry_cutoff: DateTime<Utc>,
    ) -> AppResult<BTreeMap<String, i64>> {
        let table = self.tables.notifications.read().await;
        let mut counts = BTreeMap::new();
        for n in table.values().filter(|n| {
            n.user_id == user_id && n.web && n.last_seen.is_none() && n.created > expiry_cutoff
        }) {
            *counts.entry(n.app_name.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ReadOutcome>> {
        let mut table = self.tables.notifications.write().await;
        let Some(notification) = table.get_mut(&id).filter(|n| n.user_id == user_id) else {
            return Ok(None);
        };
        let first_read = notification.last_read.is_none();
        if first_read {
            notification.last_read = Some(now);
        }
        Ok(Some(ReadOutcome {
            notification: notification.clone(),
            first_read,
        }))
    }

    async fn mark_app_read(
        &self,
        user_id: UserId,
        app_name: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let mut changed = 0;
        for n in table.values_mut().filter(|n| {
            n.user_id == user_id && n.app_name == app_name && n.last_read.is_none()
        }) {
            n.last_read = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn mark_seen(&self, user_id: UserId, app_name: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let mut changed = 0;
        for n in table.values_mut().filter(|n| {
            n.user_id == user_id && n.app_name == app_name && n.last_seen.is_none()
        }) {
            n.last_seen = Some(now);
            changed += 1;
        }
        Ok(changed)
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
        let lock = self.window_lock(user_id, course_id);
        let _guard = lock.lock().await;
        self.take_injected_failure()?;

        let rows: Vec<(Option<DateTime<Utc>>, bool)> = {
            let table = self.tables.notifications.read().await;
            table
                .values()
                .filter(|n| in_course(n, user_id, course_id) && n.created >= threshold)
                .map(|n| (n.email_sent_on, n.email_scheduled))
                .collect()
        };
        // Other windows may be written between the read and the write.
        tokio::task::yield_now().await;

        let window = EmailWindow::observe(rows, threshold);
        let action = decide(&window);

        let mut table = self.tables.notifications.write().await;
        if let Some(notification) = table.get_mut(&notification_id) {
            match action {
                EmailAction::SendImmediate => notification.email_sent_on = Some(now),
                EmailAction::ScheduleBuffer | EmailAction::AddToBuffer => {
                    notification.email_scheduled = true
                }
            }
        }
        Ok(EmailDecision { action, window })
    }

    async fn scheduled_in_window(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let table = self.tables.notifications.read().await;
        Ok(table
            .values()
            .filter(|n| {
                in_course(n, user_id, course_id)
                    && n.email_scheduled
                    && n.created >= start
                    && n.created <= end
            })
            .cloned()
            .collect())
    }

    async fn mark_emailed(&self, ids: &[NotificationId], now: DateTime<Utc>) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(n) = table.get_mut(id) {
                n.email_sent_on = Some(now);
                n.email_scheduled = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn clear_emailed(&self, ids: &[NotificationId]) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(n) = table.get_mut(id) {
                n.email_sent_on = None;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn clear_scheduled(&self, ids: &[NotificationId]) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(n) = table.get_mut(id) {
                n.email_scheduled = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn digest_audience(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<UserId>> {
        let table = self.tables.notifications.read().await;
        let users: BTreeSet<UserId> = table
            .values()
            .filter(|n| {
                n.email && n.email_sent_on.is_none() && n.created >= start && n.created <= end
            })
            .map(|n| n.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }

    async fn digest_candidates(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let table = self.tables.notifications.read().await;
        let mut rows: Vec<Notification> = table
            .values()
            .filter(|n| {
                n.user_id == user_id
                    && n.email
                    && n.email_sent_on.is_none()
                    && n.created >= start
                    && n.created <= end
            })
            .cloned()
            .collect();
        rows.sort_by_key(|n| (n.created, n.id));
        Ok(rows)
    }

    async fn delete_expired_batch(&self, cutoff: DateTime<Utc>, batch_size: i64) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let doomed: Vec<NotificationId> = table
            .values()
            .filter(|n| n.created <= cutoff)
            .map(|n| n.id)
            .take(batch_size.max(0) as usize)
            .collect();
        for id in &doomed {
            table.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_matching_batch(&self, filter: &DeleteFilter, batch_size: i64) -> AppResult<u64> {
        let mut table = self.tables.notifications.write().await;
        let doomed: Vec<NotificationId> = table
            .values()
            .filter(|n| filter.matches(n))
            .map(|n| n.id)
            .take(batch_size.max(0) as usize)
            .collect();
        for id in &doomed {
            table.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}
