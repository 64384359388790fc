//! Validation and application of preference changes.

use serde_json::Value;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_entity::preference::{
    CORE_TYPE_KEY, Channel, EmailCadence, PreferenceConfig, PreferenceUpdate, UnsubscribePatch,
};

/// Channel name that selects the cadence instead of a delivery channel.
pub const EMAIL_CADENCE_FIELD: &str = "email_cadence";

/// Build a typed update from the loosely typed request fields.
///
/// `value` must be a boolean for channels and a cadence literal for
/// `email_cadence`. `Mixed` is never accepted.
pub fn parse_update(
    app: &str,
    notification_type: &str,
    channel: &str,
    value: &Value,
) -> AppResult<PreferenceUpdate> {
    if channel == EMAIL_CADENCE_FIELD {
        let raw = value
            .as_str()
            .ok_or_else(|| AppError::validation("email_cadence must be a string"))?;
        let cadence: EmailCadence = raw.parse().map_err(AppError::validation)?;
        return Ok(PreferenceUpdate::Cadence {
            app: app.to_string(),
            notification_type: notification_type.to_string(),
            cadence,
        });
    }

    let channel: Channel = channel.parse().map_err(AppError::validation)?;
    let value = value
        .as_bool()
        .ok_or_else(|| AppError::validation(format!("{channel} value must be a boolean")))?;
    Ok(PreferenceUpdate::Channel {
        app: app.to_string(),
        notification_type: notification_type.to_string(),
        channel,
        value,
    })
}

/// Config entry an update writes to; core type names map to `core`.
pub fn target_entry(config: &PreferenceConfig, app: &str, notification_type: &str) -> String {
    match config.app(app) {
        Some(app) if app.is_core(notification_type) => CORE_TYPE_KEY.to_string(),
        _ => notification_type.to_string(),
    }
}

/// Apply one update in place.
///
/// Fails with `UnknownApp`/`UnknownType` for paths that do not exist and
/// with a validation error for non-editable channels.
pub fn apply_update(config: &mut PreferenceConfig, update: &PreferenceUpdate) -> AppResult<()> {
    let entry = target_entry(config, update.app(), update.notification_type());
    let app = config
        .app_mut(update.app())
        .ok_or_else(|| AppError::unknown_app(update.app()))?;

    if let PreferenceUpdate::Channel { channel, .. } = update {
        if app.is_non_editable(&entry, *channel) {
            return Err(AppError::validation(format!(
                "{channel} is not editable for {}",
                update.notification_type()
            )));
        }
    }

    let pref = app
        .notification_types
        .get_mut(&entry)
        .ok_or_else(|| AppError::unknown_type(update.notification_type()))?;
    match update {
        PreferenceUpdate::Channel { channel, value, .. } => pref.set_channel(*channel, *value),
        PreferenceUpdate::Cadence { cadence, .. } => pref.email_cadence = *cadence,
    }
    Ok(())
}

/// Apply an unsubscribe patch in place, skipping non-editable channels.
///
/// Returns the `(app, entry)` pairs that changed.
pub fn apply_unsubscribe(
    config: &mut PreferenceConfig,
    patch: &UnsubscribePatch,
) -> Vec<(String, String)> {
    let mut touched = Vec::new();
    for (app_name, app) in config.apps.iter_mut() {
        let wanted_entry = patch.notification_type.as_deref().map(|t| {
            if app.is_core(t) {
                CORE_TYPE_KEY.to_string()
            } else {
                t.to_string()
            }
        });
        if patch.app_name.as_deref().is_some_and(|a| a != app_name) {
            continue;
        }
        for (entry, pref) in app.notification_types.iter_mut() {
            if wanted_entry.as_deref().is_some_and(|t| t != entry) {
                continue;
            }
            let mut changed = false;
            for channel in patch.channels() {
                let locked = app
                    .non_editable
                    .get(entry)
                    .is_some_and(|channels| channels.contains(&channel));
                if !locked && pref.channel(channel) != patch.value {
                    pref.set_channel(channel, patch.value);
                    changed = true;
                }
            }
            if changed {
                touched.push((app_name.clone(), entry.clone()));
            }
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_core::error::ErrorKind;
    use notify_entity::schema::PreferenceSchema;
    use serde_json::json;

    fn config() -> PreferenceConfig {
        PreferenceSchema::builtin().default_config()
    }

    #[test]
    fn test_parse_rejects_mixed_and_non_boolean() {
        let err = parse_update("discussion", "core", "email_cadence", &json!("Mixed"))
            .expect_err("mixed");
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = parse_update("discussion", "core", "web", &json!("yes")).expect_err("bool");
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = parse_update("discussion", "core", "sms", &json!(true)).expect_err("channel");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_core_type_updates_core_entry() {
        let mut config = config();
        let update = parse_update("discussion", "new_response", "email", &json!(false))
            .expect("parse");
        apply_update(&mut config, &update).expect("apply");
        assert!(!config.resolve("discussion", "new_comment").expect("core").email);
    }

    #[test]
    fn test_cadence_update() {
        let mut config = config();
        let update = parse_update("grading", "ora_grade_assigned", "email_cadence", &json!("Weekly"))
            .expect("parse");
        apply_update(&mut config, &update).expect("apply");
        assert_eq!(
            config
                .resolve("grading", "ora_grade_assigned")
                .expect("type")
                .email_cadence,
            EmailCadence::Weekly
        );
    }

    #[test]
    fn test_non_editable_channel_rejected() {
        let mut config = config();
        let update = parse_update("discussion", "new_discussion_post", "push", &json!(true))
            .expect("parse");
        let err = apply_update(&mut config, &update).expect_err("locked");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_paths() {
        let mut config = config();
        let update = parse_update("nope", "core", "web", &json!(true)).expect("parse");
        assert_eq!(
            apply_update(&mut config, &update).expect_err("app").kind,
            ErrorKind::UnknownApp
        );
        let update = parse_update("discussion", "nope", "web", &json!(true)).expect("parse");
        assert_eq!(
            apply_update(&mut config, &update).expect_err("type").kind,
            ErrorKind::UnknownType
        );
    }

    #[test]
    fn test_unsubscribe_scope_is_exact() {
        let mut config = config();
        let patch = UnsubscribePatch {
            app_name: Some("discussion".to_string()),
            notification_type: Some("new_response".to_string()),
            channel: Some(Channel::Email),
            value: false,
            course_id: None,
        };
        let touched = apply_unsubscribe(&mut config, &patch);
        assert_eq!(touched, vec![("discussion".to_string(), CORE_TYPE_KEY.to_string())]);
        assert!(!config.resolve("discussion", "new_comment").expect("core").email);
        assert!(config.resolve("discussion", "new_comment").expect("core").web);
        assert!(config.resolve("grading", "ora_grade_assigned").expect("type").email);
    }

    #[test]
    fn test_empty_unsubscribe_turns_off_all_email() {
        let mut config = config();
        apply_unsubscribe(&mut config, &UnsubscribePatch::all_email());
        for app in config.apps.values() {
            assert!(app.notification_types.values().all(|p| !p.email));
        }
        assert!(config.resolve("updates", "course_updates").expect("type").web);
    }
}
