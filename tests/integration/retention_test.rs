//! Expiry reaper and operator deletes through the job queue.

use chrono::{Duration, Utc};

use notify_entity::job::payload::JobPayload;
use notify_entity::job::status::JobStatus;
use notify_entity::notification::{CreatedRange, DeleteFilter};
use notify_worker::JobQueue;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_reaper_removes_only_expired_notifications() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let now = Utc::now();
    for days in [61, 30, 1] {
        app.stored_notification(user.id, now - Duration::days(days)).await;
    }

    let deleted = app.services.retention.delete_expired(now).await.expect("reap");
    assert_eq!(deleted, 1);

    let remaining = app.notifications_of(user.id).await;
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|n| n.created > now - Duration::days(60)));
}

#[tokio::test]
async fn test_reaper_job_runs_through_worker() {
    let app = TestApp::new().await;
    let user = app.create_test_user("grace").await;
    let now = Utc::now();
    for days in [90, 75, 61, 10] {
        app.stored_notification(user.id, now - Duration::days(days)).await;
    }

    let queue = JobQueue::new(app.jobs(), "test");
    let job = queue
        .enqueue(&JobPayload::DeleteExpiredNotifications, 4, None)
        .await
        .expect("enqueue");
    app.worker().drain(Utc::now()).await.expect("drain");

    let job = queue.find(job.id).await.expect("job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(app.notifications_of(user.id).await.len(), 1);
}

#[tokio::test]
async fn test_operator_delete_rejects_wide_window() {
    let app = TestApp::new().await;
    let now = Utc::now();
    let filter = DeleteFilter {
        app_name: None,
        notification_type: None,
        course_id: None,
        created: CreatedRange {
            gte: now - Duration::days(30),
            lte: now,
        },
    };

    let err = app
        .services
        .retention
        .delete_notifications(&filter)
        .await
        .expect_err("window too wide");
    assert_eq!(err.kind, notify_core::error::ErrorKind::Validation);
}
