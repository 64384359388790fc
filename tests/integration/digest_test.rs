//! Cadence digests.

use chrono::{Duration, Utc};
use serde_json::json;

use notify_entity::preference::EmailCadence;

use crate::helpers::{COURSE, TestApp};

#[tokio::test]
async fn test_daily_digest_reaches_daily_audience() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let now = Utc::now();
    app.services
        .dispatcher
        .send_notifications_at(&app.send_request(&[user.id], "new_response"), now - Duration::hours(23))
        .await
        .expect("send");

    let run = app
        .services
        .digests
        .send_digest(EmailCadence::Daily, now)
        .await
        .expect("daily run");
    assert_eq!(run.sent, 1);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, user.email);
    let rows = app.notifications_of(user.id).await;
    assert_eq!(rows[0].email_sent_on, Some(now));
}

#[tokio::test]
async fn test_daily_window_excludes_older_notifications() {
    let app = TestApp::new().await;
    let user = app.create_test_user("grace").await;
    let now = Utc::now();
    let inside = app.stored_notification(user.id, now - Duration::hours(24) - Duration::minutes(10)).await;
    let outside = app.stored_notification(user.id, now - Duration::hours(24) - Duration::minutes(20)).await;

    app.services
        .digests
        .send_digest(EmailCadence::Daily, now)
        .await
        .expect("daily run");

    let rows = app.notifications_of(user.id).await;
    let find = |id| rows.iter().find(|n| n.id == id).expect("row");
    assert_eq!(find(inside.id).email_sent_on, Some(now));
    assert!(find(outside.id).email_sent_on.is_none());
    assert_eq!(app.mailer.sent().await.len(), 1);
}

#[tokio::test]
async fn test_weekly_digest_skips_daily_users() {
    let app = TestApp::new().await;
    let daily = app.create_test_user("daily").await;
    let weekly = app.create_test_user("weekly").await;
    let response = app
        .patch_preference(&weekly, COURSE, "discussion", "new_response", "email_cadence", json!("Weekly"))
        .await;
    assert_eq!(response.status, 200);

    let now = Utc::now();
    for user in [&daily, &weekly] {
        app.stored_notification(user.id, now - Duration::days(3)).await;
    }

    let run = app
        .services
        .digests
        .send_digest(EmailCadence::Weekly, now)
        .await
        .expect("weekly run");
    assert_eq!(run.audience, 2);
    assert_eq!(run.sent, 1);
    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, weekly.email);
}

#[tokio::test]
async fn test_disabled_account_is_skipped() {
    let app = TestApp::new().await;
    let mut user = app.create_test_user("margaret").await;
    user.has_usable_password = false;
    app.store.insert_user(user.clone()).await;
    let now = Utc::now();
    app.stored_notification(user.id, now - Duration::hours(2)).await;

    let run = app
        .services
        .digests
        .send_digest(EmailCadence::Daily, now)
        .await
        .expect("daily run");
    assert_eq!(run.sent, 0);
    assert!(app.mailer.sent().await.is_empty());
}
