//! Applies the preference patch carried by an unsubscribe link.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use notify_core::events::NotificationEvent;
use notify_core::result::AppResult;
use notify_database::store::UserDirectory;
use notify_entity::preference::UnsubscribePatch;

use super::token::TokenCipher;
use crate::events::EventBus;
use crate::preference::PreferenceService;

/// What an unsubscribe request did. Callers answer 200 either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// Preferences were updated; carries the number of changed entries.
    Applied(usize),
    /// The token or user was not acceptable; nothing changed.
    Ignored,
}

/// One-click unsubscribe handling.
#[derive(Clone)]
pub struct UnsubscribeService {
    cipher: Arc<TokenCipher>,
    directory: Arc<dyn UserDirectory>,
    preferences: PreferenceService,
    events: Arc<EventBus>,
}

impl UnsubscribeService {
    /// Creates a new unsubscribe service.
    pub fn new(
        cipher: Arc<TokenCipher>,
        directory: Arc<dyn UserDirectory>,
        preferences: PreferenceService,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            cipher,
            directory,
            preferences,
            events,
        }
    }

    /// The cipher used for links.
    pub fn cipher(&self) -> &TokenCipher {
        &self.cipher
    }

    /// Decode the tokens and apply the patch.
    ///
    /// A missing patch token means "all email off". Invalid tokens and
    /// unknown or inactive users are ignored without revealing which.
    pub async fn unsubscribe(
        &self,
        username_token: &str,
        patch_token: Option<&str>,
    ) -> AppResult<UnsubscribeOutcome> {
        self.unsubscribe_at(username_token, patch_token, Utc::now())
            .await
    }

    /// [`unsubscribe`](Self::unsubscribe) at an explicit time.
    pub async fn unsubscribe_at(
        &self,
        username_token: &str,
        patch_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<UnsubscribeOutcome> {
        let Ok(username) = self.cipher.decrypt_str(username_token) else {
            debug!("Unsubscribe with undecodable username token");
            return Ok(UnsubscribeOutcome::Ignored);
        };
        let patch = match patch_token.filter(|t| !t.is_empty()) {
            Some(token) => match self.cipher.decode_patch(token) {
                Ok(patch) => patch,
                Err(_) => {
                    debug!("Unsubscribe with undecodable patch token");
                    return Ok(UnsubscribeOutcome::Ignored);
                }
            },
            None => UnsubscribePatch::all_email(),
        };

        let Some(user) = self
            .directory
            .find_by_username(&username)
            .await?
            .filter(|user| user.is_active)
        else {
            debug!("Unsubscribe for unknown or inactive user");
            return Ok(UnsubscribeOutcome::Ignored);
        };

        let changed = self.preferences.unsubscribe(user.id, &patch, now).await?;
        info!(user_id = %user.id, changed, "One-click unsubscribe applied");
        self.events.publish_at(
            NotificationEvent::Unsubscribed {
                user_id: user.id,
                app_name: patch.app_name.clone(),
                notification_type: patch.notification_type.clone(),
                channel: patch.channel.map(|c| c.as_str().to_string()),
                value: patch.value,
            },
            now,
        );
        Ok(UnsubscribeOutcome::Applied(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, course};
    use notify_entity::preference::Channel;

    #[tokio::test]
    async fn test_link_disables_exactly_its_scope() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("enroll");
        let patch = UnsubscribePatch {
            app_name: Some("discussion".to_string()),
            notification_type: Some("new_response".to_string()),
            channel: Some(Channel::Email),
            value: false,
            course_id: None,
        };
        let user_token = harness.cipher.encrypt_str(&user.username).expect("user token");
        let patch_token = harness.cipher.encode_patch(&patch).expect("patch token");
        let mut events = harness.events.subscribe();

        let outcome = harness
            .unsubscribe
            .unsubscribe(&user_token, Some(&patch_token))
            .await
            .expect("unsubscribe");
        assert_eq!(outcome, UnsubscribeOutcome::Applied(1));

        let config = harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("get")
            .config()
            .expect("decode");
        let core = config.resolve("discussion", "new_response").expect("core");
        assert!(!core.email);
        assert!(core.web && core.push);
        assert!(config.resolve("grading", "ora_grade_assigned").expect("type").email);
        assert_eq!(
            events.recv().await.expect("event").payload.name(),
            "notifications.preferences.one_click_unsubscribe"
        );
    }

    #[tokio::test]
    async fn test_missing_patch_turns_off_all_email() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("enroll");
        let user_token = harness.cipher.encrypt_str(&user.username).expect("token");
        let outcome = harness
            .unsubscribe
            .unsubscribe(&user_token, None)
            .await
            .expect("unsubscribe");
        assert!(matches!(outcome, UnsubscribeOutcome::Applied(n) if n > 0));

        let config = harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("get")
            .config()
            .expect("decode");
        for app in config.apps.values() {
            for pref in app.notification_types.values() {
                assert!(!pref.email);
            }
        }
    }

    #[tokio::test]
    async fn test_value_only_patch_turns_off_every_channel() {
        let harness = Harness::new().await;
        let user = harness.learner("learner").await;
        harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("enroll");
        let user_token = harness.cipher.encrypt_str(&user.username).expect("user token");
        let patch_token = harness
            .cipher
            .encode_patch(&UnsubscribePatch::default())
            .expect("patch token");

        harness
            .unsubscribe
            .unsubscribe(&user_token, Some(&patch_token))
            .await
            .expect("unsubscribe");

        let config = harness
            .preferences
            .get_for(user.id, &course())
            .await
            .expect("get")
            .config()
            .expect("decode");
        let core = config.resolve("discussion", "new_response").expect("core");
        assert!(!core.web && !core.email && !core.push);
        let grade = config.resolve("grading", "ora_grade_assigned").expect("type");
        assert!(!grade.web && !grade.email);
    }

    #[tokio::test]
    async fn test_bad_tokens_and_unknown_users_are_ignored() {
        let harness = Harness::new().await;
        let outcome = harness
            .unsubscribe
            .unsubscribe("not-a-token", None)
            .await
            .expect("ignored");
        assert_eq!(outcome, UnsubscribeOutcome::Ignored);

        let ghost = harness.cipher.encrypt_str("ghost").expect("token");
        let outcome = harness
            .unsubscribe
            .unsubscribe(&ghost, None)
            .await
            .expect("ignored");
        assert_eq!(outcome, UnsubscribeOutcome::Ignored);

        let user = harness.learner("learner").await;
        let user_token = harness.cipher.encrypt_str(&user.username).expect("token");
        let foreign = TokenCipher::new("another-secret")
            .encode_patch(&UnsubscribePatch::default())
            .expect("foreign");
        let outcome = harness
            .unsubscribe
            .unsubscribe(&user_token, Some(&foreign))
            .await
            .expect("ignored");
        assert_eq!(outcome, UnsubscribeOutcome::Ignored);
    }
}
