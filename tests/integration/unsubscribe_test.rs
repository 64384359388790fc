//! One-click unsubscribe links.

use serde_json::json;

use notify_core::types::CourseKey;
use notify_entity::preference::{Channel, UnsubscribePatch};

use crate::helpers::{COURSE, SECOND_COURSE, TestApp};

fn type_config<'a>(body: &'a serde_json::Value, app: &str, entry: &str) -> &'a serde_json::Value {
    &body["notification_preference_config"][app]["notification_types"][entry]
}

#[tokio::test]
async fn test_scoped_patch_disables_only_its_scope() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let token = app.token(&user);
    for course in [COURSE, SECOND_COURSE] {
        app.request("GET", &format!("/api/configurations/{course}"), None, Some(&token))
            .await;
    }

    let cipher = &app.services.cipher;
    let username_token = cipher.encrypt_str(&user.username).expect("encrypt username");
    let patch_token = cipher
        .encode_patch(&UnsubscribePatch {
            app_name: Some("grading".to_string()),
            notification_type: Some("ora_grade_assigned".to_string()),
            channel: Some(Channel::Email),
            value: false,
            course_id: Some(CourseKey::new(COURSE)),
        })
        .expect("encode patch");

    let response = app
        .request(
            "GET",
            &format!("/api/preferences-unsubscribe/{username_token}/{patch_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["message"], json!("Successfully unsubscribed"));

    let first = app
        .request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&token))
        .await;
    let grade = type_config(&first.body, "grading", "ora_grade_assigned");
    assert_eq!(grade["email"], json!(false));
    assert_eq!(grade["web"], json!(true));
    assert_eq!(type_config(&first.body, "discussion", "core")["email"], json!(true));

    let second = app
        .request("GET", &format!("/api/configurations/{SECOND_COURSE}"), None, Some(&token))
        .await;
    assert_eq!(
        type_config(&second.body, "grading", "ora_grade_assigned")["email"],
        json!(true)
    );
}

#[tokio::test]
async fn test_patch_without_channel_turns_off_every_channel() {
    let app = TestApp::new().await;
    let user = app.create_test_user("lin").await;
    let token = app.token(&user);
    app.request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&token))
        .await;

    let cipher = &app.services.cipher;
    let username_token = cipher.encrypt_str(&user.username).expect("encrypt username");
    let patch_token = cipher
        .encode_patch(&UnsubscribePatch {
            app_name: Some("discussion".to_string()),
            ..UnsubscribePatch::default()
        })
        .expect("encode patch");
    let response = app
        .request(
            "GET",
            &format!("/api/preferences-unsubscribe/{username_token}/{patch_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status, 200);

    let config = app
        .request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&token))
        .await;
    let core = type_config(&config.body, "discussion", "core");
    assert_eq!(core["web"], json!(false));
    assert_eq!(core["email"], json!(false));
    assert_eq!(core["push"], json!(false));
    assert_eq!(
        type_config(&config.body, "grading", "ora_grade_assigned")["email"],
        json!(true)
    );
}

#[tokio::test]
async fn test_unknown_user_is_indistinguishable() {
    let app = TestApp::new().await;
    let token = app
        .services
        .cipher
        .encrypt_str("nobody")
        .expect("encrypt username");

    let unknown = app
        .request("POST", &format!("/api/preferences-unsubscribe/{token}"), None, None)
        .await;
    let garbage = app
        .request("POST", "/api/preferences-unsubscribe/garbage", None, None)
        .await;
    assert_eq!(unknown.status, 200);
    assert_eq!(garbage.status, 200);
    assert_eq!(unknown.body, garbage.body);
}

#[tokio::test]
async fn test_repeated_links_are_rate_limited() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        let response = app
            .request("GET", "/api/preferences-unsubscribe/hammered", None, None)
            .await;
        assert_eq!(response.status, 200);
    }
    let limited = app
        .request("GET", "/api/preferences-unsubscribe/hammered", None, None)
        .await;
    assert_eq!(limited.status, 429);
}

#[tokio::test]
async fn test_emails_carry_working_unsubscribe_links() {
    let app = TestApp::new().await;
    let user = app.create_test_user("grace").await;
    let response = app
        .patch_preference(&user, COURSE, "discussion", "new_response", "email_cadence", json!("Immediately"))
        .await;
    assert_eq!(response.status, 200);
    app.services
        .dispatcher
        .send_notifications(&app.send_request(&[user.id], "new_response"))
        .await
        .expect("send");

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    let marker = "/api/preferences-unsubscribe/";
    let start = sent[0].html_body.find(marker).expect("unsubscribe link") + marker.len();
    let link: String = sent[0].html_body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        .collect();

    let response = app
        .request("GET", &format!("{marker}{link}"), None, None)
        .await;
    assert_eq!(response.status, 200);

    let config = app
        .request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&app.token(&user)))
        .await;
    assert_eq!(type_config(&config.body, "discussion", "core")["email"], json!(false));
}
