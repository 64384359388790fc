//! Preference endpoints.

use chrono::Utc;
use serde_json::json;

use notify_core::types::CourseKey;
use notify_entity::preference::CoursePreference;

use crate::helpers::{COURSE, SECOND_COURSE, TestApp};

#[tokio::test]
async fn test_outdated_config_is_migrated_on_read() {
    let app = TestApp::new().await;
    let user = app.create_test_user("ada").await;
    let schema = &app.services.schema;

    let mut stored = schema.default_config();
    stored
        .app_mut("discussion")
        .expect("discussion app")
        .notification_types
        .get_mut("new_discussion_post")
        .expect("type")
        .email = true;
    stored
        .app_mut("grading")
        .expect("grading app")
        .notification_types
        .remove("ora_grade_assigned");
    let now = Utc::now();
    app.store
        .put_course_preference(CoursePreference {
            id: 1,
            user_id: user.id,
            course_id: CourseKey::new(COURSE),
            notification_preference_config: stored.to_value().expect("encode"),
            config_version: schema.version - 1,
            is_active: true,
            created: now,
            modified: now,
        })
        .await;

    let response = app
        .request("GET", &format!("/api/configurations/{COURSE}"), None, Some(&app.token(&user)))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["config_version"], json!(schema.version));
    let config = &response.body["notification_preference_config"];
    assert!(config["grading"]["notification_types"]["ora_grade_assigned"].is_object());
    assert_eq!(
        config["grading"]["notification_types"]["ora_grade_assigned"]["email"],
        json!(true)
    );
    assert_eq!(
        config["discussion"]["notification_types"]["new_discussion_post"]["email"],
        json!(true)
    );
    assert_eq!(config["discussion"]["notification_types"]["core"]["email"], json!(true));
}

#[tokio::test]
async fn test_aggregate_marks_divergent_cadence_mixed() {
    let app = TestApp::new().await;
    let user = app.create_test_user("grace").await;
    for (course, email, cadence) in [(COURSE, true, "Daily"), (SECOND_COURSE, false, "Weekly")] {
        let response = app
            .patch_preference(&user, course, "discussion", "new_comment", "email", json!(email))
            .await;
        assert_eq!(response.status, 200);
        let response = app
            .patch_preference(&user, course, "discussion", "new_comment", "email_cadence", json!(cadence))
            .await;
        assert_eq!(response.status, 200);
    }

    let response = app
        .request("GET", "/api/aggregate", None, Some(&app.token(&user)))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["show_preferences"], json!(true));
    let core = &response.body["data"]["discussion"]["notification_types"]["core"];
    assert_eq!(core["email"], json!(true));
    assert_eq!(core["email_cadence"], json!("Mixed"));
}

#[tokio::test]
async fn test_update_all_touches_every_course() {
    let app = TestApp::new().await;
    let user = app.create_test_user("linus").await;
    let token = app.token(&user);
    for course in [COURSE, SECOND_COURSE] {
        let response = app
            .request("GET", &format!("/api/configurations/{course}"), None, Some(&token))
            .await;
        assert_eq!(response.status, 200);
    }

    let response = app
        .request(
            "POST",
            "/api/preferences/update-all",
            Some(json!({
                "notification_app": "updates",
                "notification_type": "course_updates",
                "notification_channel": "email",
                "value": true,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["total"], json!(2));
    assert_eq!(response.body["success_count"], json!(2));

    for course in [COURSE, SECOND_COURSE] {
        let response = app
            .request("GET", &format!("/api/configurations/{course}"), None, Some(&token))
            .await;
        assert_eq!(
            response.body["notification_preference_config"]["updates"]["notification_types"]
                ["course_updates"]["email"],
            json!(true)
        );
    }
}

#[tokio::test]
async fn test_non_editable_channel_is_rejected() {
    let app = TestApp::new().await;
    let user = app.create_test_user("barbara").await;
    let response = app
        .patch_preference(&user, COURSE, "discussion", "new_discussion_post", "push", json!(true))
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], json!("VALIDATION"));
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request("GET", "/api/aggregate", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_stale_version_is_conflict() {
    let app = TestApp::new().await;
    let user = app.create_test_user("katherine").await;
    let response = app
        .request(
            "PATCH",
            &format!("/api/configurations/{COURSE}"),
            Some(json!({
                "notification_app": "discussion",
                "notification_type": "new_response",
                "notification_channel": "web",
                "value": false,
                "config_version": app.services.schema.version + 5,
            })),
            Some(&app.token(&user)),
        )
        .await;
    assert_eq!(response.status, 409);
}
