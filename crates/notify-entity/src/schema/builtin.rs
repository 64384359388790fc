//! Built-in apps and types.

use crate::preference::{Channel, EmailCadence};
use crate::user::CourseRole;

use super::{AppDefinition, PreferenceSchema, SCHEMA_VERSION, TypeDefinition};

fn app(name: &str, info: &str) -> AppDefinition {
    AppDefinition {
        name: name.to_string(),
        enabled: true,
        core_web: true,
        core_email: true,
        core_push: true,
        core_email_cadence: EmailCadence::Daily,
        core_info: info.to_string(),
        non_editable: Vec::new(),
    }
}

fn core_type(name: &str, template: &str, fields: &[&str]) -> TypeDefinition {
    TypeDefinition {
        name: name.to_string(),
        app: "discussion".to_string(),
        is_core: true,
        web: true,
        email: true,
        push: true,
        email_cadence: EmailCadence::Daily,
        non_editable: Vec::new(),
        visible_to: None,
        info: String::new(),
        content_template: template.to_string(),
        content_context_fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn typed(
    name: &str,
    app: &str,
    web: bool,
    email: bool,
    visible_to: Option<&[CourseRole]>,
    info: &str,
    template: &str,
    fields: &[&str],
) -> TypeDefinition {
    TypeDefinition {
        name: name.to_string(),
        app: app.to_string(),
        is_core: false,
        web,
        email,
        push: false,
        email_cadence: EmailCadence::Daily,
        non_editable: vec![Channel::Push],
        visible_to: visible_to.map(<[CourseRole]>::to_vec),
        info: info.to_string(),
        content_template: template.to_string(),
        content_context_fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

pub(super) fn schema() -> PreferenceSchema {
    let apps = vec![
        app(
            "discussion",
            "Notifications for responses and comments on your posts, and the ones you’re following, including endorsements to your responses and on your posts.",
        ),
        app("updates", "Notifications for new announcements and updates from the course team."),
        app("grading", "Notifications for submission grading."),
    ];

    let types = vec![
        core_type(
            "new_comment_on_response",
            "<p><strong>{replier_name}</strong> commented on your response to the post <strong>{post_title}</strong></p>",
            &["post_title", "replier_name"],
        ),
        core_type(
            "new_comment",
            "<p><strong>{replier_name}</strong> commented on <strong>{author_name}</strong> response to your post <strong>{post_title}</strong></p>",
            &["author_name", "post_title", "replier_name"],
        ),
        core_type(
            "new_response",
            "<p><strong>{replier_name}</strong> responded to your post <strong>{post_title}</strong></p>",
            &["post_title", "replier_name"],
        ),
        core_type(
            "response_on_followed_post",
            "<p><strong>{replier_name}</strong> responded to a post you’re following: <strong>{post_title}</strong></p>",
            &["post_title", "replier_name"],
        ),
        core_type(
            "comment_on_followed_post",
            "<p><strong>{replier_name}</strong> commented on <strong>{author_name}</strong> response in a post you’re following <strong>{post_title}</strong></p>",
            &["author_name", "post_title", "replier_name"],
        ),
        core_type(
            "response_endorsed_on_thread",
            "<p><strong>{replier_name}</strong> response has been endorsed in your post <strong>{post_title}</strong></p>",
            &["post_title", "replier_name"],
        ),
        core_type(
            "response_endorsed",
            "<p>Your response has been endorsed on the post <strong>{post_title}</strong></p>",
            &["post_title"],
        ),
        typed(
            "new_discussion_post",
            "discussion",
            false,
            false,
            None,
            "",
            "<p><strong>{username}</strong> posted <strong>{post_title}</strong></p>",
            &["post_title", "username"],
        ),
        typed(
            "new_question_post",
            "discussion",
            false,
            false,
            None,
            "",
            "<p><strong>{username}</strong> asked <strong>{post_title}</strong></p>",
            &["post_title", "username"],
        ),
        typed(
            "content_reported",
            "discussion",
            true,
            true,
            Some(&CourseRole::FORUM_PRIVILEGED[..]),
            "Notifications for reported content, visible to forum moderators.",
            "<p>{username}’s {content_type} has been reported <strong>{content}</strong></p>",
            &["content", "content_type", "username"],
        ),
        typed(
            "new_instructor_all_learners_post",
            "discussion",
            true,
            false,
            None,
            "",
            "<p>Your instructor posted <strong>{post_title}</strong></p>",
            &["post_title"],
        ),
        typed(
            "course_updates",
            "updates",
            true,
            false,
            None,
            "",
            "<p><strong>{course_update_content}</strong></p>",
            &["course_update_content"],
        ),
        typed(
            "ora_staff_notifications",
            "grading",
            true,
            false,
            Some(&CourseRole::COURSE_STAFF[..]),
            "Notifications for new submissions awaiting staff review.",
            "<p>You have a new open response submission awaiting review for <strong>{ora_name}</strong></p>",
            &["ora_name"],
        ),
        typed(
            "ora_grade_assigned",
            "grading",
            true,
            true,
            None,
            "",
            "<p>You have received {points_earned} out of {points_possible} on your assessment: <strong>{ora_name}</strong></p>",
            &["ora_name", "points_earned", "points_possible"],
        ),
    ];

    PreferenceSchema {
        version: SCHEMA_VERSION,
        apps,
        types,
    }
}
