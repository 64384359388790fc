//! Tray listing, counts, read and seen.

use serde_json::json;

use notify_core::types::CourseKey;
use notify_entity::user::CourseRole;

use crate::helpers::{COURSE, TestApp};

#[tokio::test]
async fn test_tray_count_read_and_seen() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let token = app.token(&user);
    for _ in 0..2 {
        app.services
            .dispatcher
            .send_notifications(&app.send_request(&[user.id], "new_response"))
            .await
            .expect("send");
    }

    let count = app.request("GET", "/api/count", None, Some(&token)).await;
    assert_eq!(count.status, 200);
    assert_eq!(count.body["count"], json!(2));
    assert_eq!(count.body["count_by_app_name"]["discussion"], json!(2));
    assert_eq!(count.body["count_by_app_name"]["grading"], json!(0));
    assert_eq!(count.body["notification_expiry_days"], json!(60));

    let list = app
        .request("GET", "/api/notifications?page=1&page_size=1", None, Some(&token))
        .await;
    assert_eq!(list.status, 200);
    assert_eq!(list.body["count"], json!(2));
    assert_eq!(list.body["num_pages"], json!(2));
    assert_eq!(list.body["next"], json!(2));
    let first = &list.body["results"][0];
    assert!(first["content"].as_str().is_some_and(|c| !c.is_empty()));

    let read = app
        .request(
            "PATCH",
            "/api/notifications/read",
            Some(json!({ "notification_id": first["id"] })),
            Some(&token),
        )
        .await;
    assert_eq!(read.status, 200);
    assert_eq!(read.body["message"], json!("Notification marked read."));

    let read_all = app
        .request(
            "PATCH",
            "/api/notifications/read",
            Some(json!({ "app_name": "discussion" })),
            Some(&token),
        )
        .await;
    assert_eq!(read_all.body["message"], json!("Notifications marked read."));

    let seen = app
        .request("PATCH", "/api/notifications/discussion/seen", None, Some(&token))
        .await;
    assert_eq!(seen.status, 200);
    assert_eq!(seen.body["message"], json!("Notifications marked as seen."));

    let count = app.request("GET", "/api/count", None, Some(&token)).await;
    assert_eq!(count.body["count"], json!(0));
    assert!(app.notifications_of(user.id).await.iter().all(|n| n.last_read.is_some()));
}

#[tokio::test]
async fn test_mark_read_validates_input() {
    let app = TestApp::new().await;
    let owner = app.create_test_user("grace").await;
    let other = app.create_test_user("linus").await;
    app.services
        .dispatcher
        .send_notifications(&app.send_request(&[owner.id], "new_response"))
        .await
        .expect("send");
    let id = app.notifications_of(owner.id).await[0].id;

    let missing = app
        .request("PATCH", "/api/notifications/read", Some(json!({})), Some(&app.token(&other)))
        .await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.body["message"], json!("Invalid app_name or notification_id."));

    let unknown_app = app
        .request(
            "PATCH",
            "/api/notifications/read",
            Some(json!({ "app_name": "gradebook" })),
            Some(&app.token(&other)),
        )
        .await;
    assert_eq!(unknown_app.status, 400);

    let foreign = app
        .request(
            "PATCH",
            "/api/notifications/read",
            Some(json!({ "notification_id": id })),
            Some(&app.token(&other)),
        )
        .await;
    assert_eq!(foreign.status, 404);
    assert!(app.notifications_of(owner.id).await[0].last_read.is_none());
}

#[tokio::test]
async fn test_grouped_comment_returns_to_unseen() {
    let app = TestApp::new().await;
    let user = app.create_test_user("barbara").await;
    let token = app.token(&user);
    let mut request = app.send_request(&[user.id], "new_comment");
    request.group_by_id = Some("thread-1".to_string());

    app.services.dispatcher.send_notifications(&request).await.expect("first");
    app.request("PATCH", "/api/notifications/discussion/seen", None, Some(&token))
        .await;
    app.services.dispatcher.send_notifications(&request).await.expect("second");

    let list = app.request("GET", "/api/notifications", None, Some(&token)).await;
    assert_eq!(list.body["count"], json!(1));
    let item = &list.body["results"][0];
    assert_eq!(item["content_context"]["grouped_count"], json!(2));
    assert!(item["last_seen"].is_null());
    assert!(item["last_read"].is_null());
}

#[tokio::test]
async fn test_restricted_type_reaches_privileged_users_only() {
    let app = TestApp::new().await;
    let moderator = app.create_test_user("moderator").await;
    let learner = app.create_test_user("learner").await;
    app.store
        .grant_role(moderator.id, CourseKey::new(COURSE), CourseRole::ForumModerator)
        .await;

    let summary = app
        .services
        .dispatcher
        .send_notifications(&app.send_request(&[moderator.id, learner.id], "content_reported"))
        .await
        .expect("send");
    assert_eq!(summary.created, 1);
    assert_eq!(app.notifications_of(moderator.id).await.len(), 1);
    assert!(app.notifications_of(learner.id).await.is_empty());

    let config = app
        .request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&app.token(&learner)))
        .await;
    assert!(
        config.body["notification_preference_config"]["discussion"]["notification_types"]
            ["content_reported"]
            .is_null()
    );
}
