//! Migration of stored configs to the current schema version.

use serde_json::Value;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_entity::preference::{Channel, EmailCadence, PreferenceConfig, TypePreference};
use notify_entity::schema::PreferenceSchema;

/// Rebuild `old` against `schema`.
///
/// Starts from the schema defaults and carries forward every channel flag
/// and cadence stored under an `(app, entry, field)` path that still exists.
/// Entries the schema removed are dropped; new entries get defaults.
/// Channels that are non-editable always take the schema value.
pub fn sync(old: &Value, schema: &PreferenceSchema) -> AppResult<PreferenceConfig> {
    let Value::Object(old_apps) = old else {
        return Err(AppError::validation(
            "Stored preference config is not an object",
        ));
    };

    let mut config = schema.default_config();
    for (app_name, app) in config.apps.iter_mut() {
        let Some(old_types) = old_apps
            .get(app_name)
            .and_then(|a| a.get("notification_types"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for (entry, pref) in app.notification_types.iter_mut() {
            let Some(old_entry) = old_types.get(entry) else {
                continue;
            };
            let locked = app.non_editable.get(entry).cloned().unwrap_or_default();
            carry_forward(pref, old_entry, &locked);
        }
    }
    Ok(config)
}

fn carry_forward(pref: &mut TypePreference, old: &Value, locked: &[Channel]) {
    for channel in Channel::ALL {
        if locked.contains(&channel) {
            continue;
        }
        if let Some(value) = old.get(channel.as_str()).and_then(Value::as_bool) {
            pref.set_channel(channel, value);
        }
    }
    if let Some(cadence) = old.get("email_cadence").and_then(Value::as_str) {
        pref.email_cadence = stored_cadence(cadence).unwrap_or(pref.email_cadence);
    }
}

/// Parse a stored cadence; a leaked `Mixed` is rewritten to `Daily`.
fn stored_cadence(raw: &str) -> Option<EmailCadence> {
    match raw {
        "Mixed" => Some(EmailCadence::Daily),
        other => other.parse().ok(),
    }
}

/// Whether a stored document needs migrating.
pub fn needs_sync(stored_version: i32, schema: &PreferenceSchema) -> bool {
    stored_version != schema.version
}
