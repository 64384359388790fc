//! Fan-out and immediate email delivery.

use chrono::{Duration, Utc};
use serde_json::json;

use notify_entity::job::payload::JobPayload;

use crate::helpers::{COURSE, TestApp};

/// Immediate email, then a buffered window coalesced into one digest.
#[tokio::test]
async fn test_immediate_then_buffer_then_coalesced_digest() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let patched = app
        .patch_preference(&user, COURSE, "discussion", "new_response", "email_cadence", json!("Immediately"))
        .await;
    assert_eq!(patched.status, 200);

    let t = Utc::now() - Duration::minutes(30);
    let dispatcher = &app.services.dispatcher;
    let request = app.send_request(&[user.id], "new_response");

    dispatcher.send_notifications_at(&request, t).await.expect("first event");
    assert_eq!(app.mailer.sent().await.len(), 1);
    let rows = app.notifications_of(user.id).await;
    assert_eq!(rows[0].email_sent_on, Some(t));

    dispatcher
        .send_notifications_at(&request, t + Duration::minutes(2))
        .await
        .expect("second event");
    let rows = app.notifications_of(user.id).await;
    assert!(rows[1].email_scheduled);
    let jobs = app.store.all_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].scheduled_at,
        Some(t + Duration::minutes(2) + Duration::minutes(15))
    );
    assert!(matches!(
        jobs[0].typed_payload().expect("payload"),
        JobPayload::SendBufferedDigest { start_date, .. } if start_date == t
    ));

    dispatcher
        .send_notifications_at(&request, t + Duration::minutes(10))
        .await
        .expect("third event");
    let rows = app.notifications_of(user.id).await;
    assert_eq!(rows.len(), 3);
    assert!(rows[2].email_scheduled);
    assert_eq!(app.store.all_jobs().await.len(), 1);
    assert_eq!(app.mailer.sent().await.len(), 1);

    let processed = app.worker().drain(Utc::now()).await.expect("drain");
    assert_eq!(processed, 1);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, user.email);
    assert!(sent[1].subject.contains("2 new notifications"));

    let rows = app.notifications_of(user.id).await;
    assert_eq!(rows[0].email_sent_on, Some(t));
    let digest_time = rows[1].email_sent_on.expect("n2 emailed");
    assert_eq!(rows[2].email_sent_on, Some(digest_time));
    assert!(digest_time > t + Duration::minutes(10));
    assert!(rows.iter().all(|n| !n.email_scheduled));
}

#[tokio::test]
async fn test_disabled_preference_blocks_delivery() {
    let app = TestApp::new().await;
    let user = app.create_test_user("grace").await;
    let request = app.send_request(&[user.id], "new_discussion_post");

    let enabled = app
        .patch_preference(&user, COURSE, "discussion", "new_discussion_post", "web", json!(true))
        .await;
    assert_eq!(enabled.status, 200);
    let summary = app
        .services
        .dispatcher
        .send_notifications(&request)
        .await
        .expect("send");
    assert_eq!(summary.created, 1);

    for channel in ["web", "email"] {
        let response = app
            .patch_preference(&user, COURSE, "discussion", "new_discussion_post", channel, json!(false))
            .await;
        assert_eq!(response.status, 200);
    }
    let summary = app
        .services
        .dispatcher
        .send_notifications(&request)
        .await
        .expect("send");
    assert_eq!(summary.created, 0);
    assert_eq!(app.notifications_of(user.id).await.len(), 1);
    assert!(app.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_daily_cadence_waits_for_digest() {
    let app = TestApp::new().await;
    let user = app.create_test_user("linus").await;
    let summary = app
        .services
        .dispatcher
        .send_notifications(&app.send_request(&[user.id], "new_response"))
        .await
        .expect("send");
    assert_eq!(summary.created, 1);

    let rows = app.notifications_of(user.id).await;
    assert!(rows[0].email);
    assert!(rows[0].email_sent_on.is_none());
    assert!(app.mailer.sent().await.is_empty());
    assert!(app.store.all_jobs().await.is_empty());
}

#[tokio::test]
async fn test_missing_context_field_is_rejected() {
    let app = TestApp::new().await;
    let user = app.create_test_user("barbara").await;
    let mut request = app.send_request(&[user.id], "new_response");
    request.context.clear();

    let err = app
        .services
        .dispatcher
        .send_notifications(&request)
        .await
        .expect_err("context incomplete");
    assert_eq!(err.kind, notify_core::error::ErrorKind::InvalidContext);
    assert!(app.notifications_of(user.id).await.is_empty());
}
