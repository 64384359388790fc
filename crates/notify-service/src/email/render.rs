//! Rendering of notification content and email bodies.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use notify_core::config::EmailConfig;
use notify_entity::notification::{ContentContext, Notification};
use notify_entity::preference::UnsubscribePatch;
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::UserProfile;

use super::mailer::OutgoingEmail;
use crate::unsubscribe::TokenCipher;

/// Substitute `{field}` placeholders with escaped context values.
///
/// Placeholders without a value render as an empty string.
pub fn render_template(template: &str, context: &ContentContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_field_name(&after[..close]) => {
                if let Some(value) = context.get(&after[..close]) {
                    out.push_str(&escape_html(&display_value(value)));
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Drop tags and decode the entities produced by [`escape_html`].
fn to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            other if !in_tag => out.push(other),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Builds email messages from notifications.
#[derive(Debug, Clone)]
pub struct EmailRenderer {
    schema: Arc<PreferenceSchema>,
    platform_name: String,
    site_url: String,
    cipher: Option<Arc<TokenCipher>>,
}

impl EmailRenderer {
    /// Creates a renderer for the given schema and email settings.
    pub fn new(schema: Arc<PreferenceSchema>, config: &EmailConfig) -> Self {
        Self {
            schema,
            platform_name: config.platform_name.clone(),
            site_url: config.site_url.trim_end_matches('/').to_string(),
            cipher: None,
        }
    }

    /// Add one-click unsubscribe links to every email.
    pub fn with_unsubscribe(mut self, cipher: Arc<TokenCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// In-app HTML content of a notification.
    pub fn render_content(&self, notification: &Notification) -> String {
        match self.schema.notification_type(&notification.notification_type) {
            Some(definition) => {
                render_template(&definition.content_template, &notification.context())
            }
            None => String::new(),
        }
    }

    /// Single-notification email.
    pub fn immediate(&self, user: &UserProfile, notification: &Notification) -> OutgoingEmail {
        let content = self.render_content(notification);
        let mut html = format!("<div class=\"notification\">{content}");
        if let Some(url) = &notification.content_url {
            html.push_str(&format!(
                "<p><a href=\"{}\">View</a></p>",
                escape_html(&self.absolute(url))
            ));
        }
        html.push_str("</div>");
        self.finish(user, self.subject_from(&content), html, Some(notification))
    }

    /// Digest of several notifications, grouped by app in schema order.
    pub fn digest(
        &self,
        user: &UserProfile,
        notifications: &[Notification],
        period: &str,
    ) -> OutgoingEmail {
        let mut by_app: BTreeMap<usize, (&str, Vec<&Notification>)> = BTreeMap::new();
        for notification in notifications {
            let position = self
                .schema
                .apps
                .iter()
                .position(|app| app.name == notification.app_name)
                .unwrap_or(usize::MAX);
            by_app
                .entry(position)
                .or_insert_with(|| (notification.app_name.as_str(), Vec::new()))
                .1
                .push(notification);
        }

        let mut html = String::from("<div class=\"digest\">");
        for (app_name, items) in by_app.values() {
            html.push_str(&format!(
                "<h2>{}</h2><ul>",
                escape_html(&title_case(app_name))
            ));
            for notification in items {
                html.push_str("<li>");
                html.push_str(&self.render_content(notification));
                if let Some(url) = &notification.content_url {
                    html.push_str(&format!(
                        " <a href=\"{}\">View</a>",
                        escape_html(&self.absolute(url))
                    ));
                }
                html.push_str("</li>");
            }
            html.push_str("</ul>");
        }
        html.push_str("</div>");

        let subject = format!(
            "{} {} digest: {} new notification{}",
            self.platform_name,
            period,
            notifications.len(),
            if notifications.len() == 1 { "" } else { "s" }
        );
        self.finish(user, subject, html, None)
    }

    /// Unsubscribe URL for a user and patch, if a cipher is configured.
    pub fn unsubscribe_url(&self, username: &str, patch: &UnsubscribePatch) -> Option<String> {
        let cipher = self.cipher.as_ref()?;
        let user_token = cipher.encrypt_str(username).ok()?;
        let patch_token = cipher.encode_patch(patch).ok()?;
        Some(format!(
            "{}/api/preferences-unsubscribe/{user_token}/{patch_token}",
            self.site_url
        ))
    }

    fn finish(
        &self,
        user: &UserProfile,
        subject: String,
        mut html: String,
        notification: Option<&Notification>,
    ) -> OutgoingEmail {
        let patch = match notification {
            Some(n) => UnsubscribePatch {
                app_name: Some(n.app_name.clone()),
                notification_type: Some(n.notification_type.clone()),
                channel: Some(notify_entity::preference::Channel::Email),
                value: false,
                course_id: n.course_id.clone(),
            },
            None => UnsubscribePatch::all_email(),
        };
        if let Some(url) = self.unsubscribe_url(&user.username, &patch) {
            html.push_str(&format!(
                "<p class=\"footer\"><a href=\"{}\">Unsubscribe</a></p>",
                escape_html(&url)
            ));
        }
        OutgoingEmail {
            to: user.email.clone(),
            subject,
            text_body: to_text(&html),
            html_body: html,
        }
    }

    fn subject_from(&self, content: &str) -> String {
        let text = to_text(content);
        let mut subject: String = text.chars().take(120).collect();
        if subject.is_empty() {
            subject = format!("New notification from {}", self.platform_name);
        }
        subject
    }

    fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.site_url, url.trim_start_matches('/'))
        }
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notify_core::types::{CourseKey, NotificationId, UserId};
    use serde_json::json;

    fn context(value: Value) -> ContentContext {
        match value {
            Value::Object(map) => map,
            _ => ContentContext::new(),
        }
    }

    fn notification(app: &str, notification_type: &str, ctx: Value) -> Notification {
        Notification {
            id: NotificationId(1),
            user_id: UserId::new(),
            course_id: Some(CourseKey::new("course-v1:Org+X+1")),
            app_name: app.to_string(),
            notification_type: notification_type.to_string(),
            content_context: ctx,
            content_url: Some("/courses/x/discussion".to_string()),
            web: true,
            email: true,
            last_read: None,
            last_seen: None,
            group_by_id: String::new(),
            email_sent_on: None,
            email_scheduled: false,
            created: Utc::now(),
            email_content: None,
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            id: UserId::new(),
            username: "learner".to_string(),
            email: "learner@example.org".to_string(),
            is_active: true,
            has_usable_password: true,
            language: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_template_substitution_escapes_values() {
        let rendered = render_template(
            "<p><strong>{replier_name}</strong> on {post_title} {missing} {not a field}</p>",
            &context(json!({"replier_name": "<script>", "post_title": "Week & 1"})),
        );
        assert_eq!(
            rendered,
            "<p><strong>&lt;script&gt;</strong> on Week &amp; 1  {not a field}</p>"
        );
    }

    #[test]
    fn test_digest_groups_by_app_in_schema_order() {
        let renderer = EmailRenderer::new(
            Arc::new(PreferenceSchema::builtin()),
            &EmailConfig::default(),
        );
        let items = vec![
            notification("grading", "ora_grade_assigned", json!({"ora_name": "Essay", "course_name": "CS"})),
            notification(
                "discussion",
                "new_response",
                json!({"replier_name": "bob", "post_title": "Intro"}),
            ),
        ];
        let email = renderer.digest(&user(), &items, "Daily");
        let discussion = email.html_body.find("Discussion").expect("discussion heading");
        let grading = email.html_body.find("Grading").expect("grading heading");
        assert!(discussion < grading);
        assert!(email.subject.contains("2 new notifications"));
        assert!(email.text_body.contains("bob responded to your post Intro"));
    }

    #[test]
    fn test_immediate_email_uses_absolute_link_and_unsubscribe_footer() {
        let cipher = Arc::new(TokenCipher::new("secret"));
        let renderer = EmailRenderer::new(
            Arc::new(PreferenceSchema::builtin()),
            &EmailConfig::default(),
        )
        .with_unsubscribe(cipher);
        let email = renderer.immediate(
            &user(),
            &notification(
                "discussion",
                "new_response",
                json!({"replier_name": "bob", "post_title": "Intro"}),
            ),
        );
        assert_eq!(email.to, "learner@example.org");
        assert!(email.html_body.contains("http://localhost:8080/courses/x/discussion"));
        assert!(email.html_body.contains("preferences-unsubscribe/"));
        assert_eq!(email.subject, "bob responded to your post Intro");
    }
}
