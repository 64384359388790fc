//! Installation-level overrides of the preference schema.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use notify_core::config::OverrideValues;
use notify_entity::preference::{Channel, EmailCadence};
use notify_entity::schema::PreferenceSchema;

/// Keys an override may set on a type or an app.
pub const OVERRIDABLE_KEYS: [&str; 5] = ["web", "email", "push", "non_editable", "email_cadence"];

/// Return a copy of `builtin` with the configured overrides applied.
///
/// App overrides target the core settings of the app. Unknown keys, unknown
/// names and malformed values are skipped with a warning.
pub fn apply_overrides(
    builtin: &PreferenceSchema,
    type_overrides: &BTreeMap<String, OverrideValues>,
    app_overrides: &BTreeMap<String, OverrideValues>,
) -> PreferenceSchema {
    let mut schema = builtin.clone();

    for (app_name, values) in app_overrides {
        let Some(app) = schema.apps.iter_mut().find(|a| &a.name == app_name) else {
            warn!(app = %app_name, "Ignoring override for unknown notification app");
            continue;
        };
        for (key, value) in allowed(values, app_name) {
            let applied = match key {
                "web" => set_bool(&mut app.core_web, value),
                "email" => set_bool(&mut app.core_email, value),
                "push" => set_bool(&mut app.core_push, value),
                "email_cadence" => set_cadence(&mut app.core_email_cadence, value),
                _ => set_channels(&mut app.non_editable, value),
            };
            if !applied {
                warn!(app = %app_name, key, %value, "Ignoring malformed app override");
            }
        }
    }

    for (type_name, values) in type_overrides {
        let Some(definition) = schema.types.iter_mut().find(|t| &t.name == type_name) else {
            warn!(notification_type = %type_name, "Ignoring override for unknown notification type");
            continue;
        };
        for (key, value) in allowed(values, type_name) {
            let applied = match key {
                "web" => set_bool(&mut definition.web, value),
                "email" => set_bool(&mut definition.email, value),
                "push" => set_bool(&mut definition.push, value),
                "email_cadence" => set_cadence(&mut definition.email_cadence, value),
                _ => set_channels(&mut definition.non_editable, value),
            };
            if !applied {
                warn!(notification_type = %type_name, key, %value, "Ignoring malformed type override");
            }
        }
    }

    schema
}

fn allowed<'a>(
    values: &'a OverrideValues,
    target: &'a str,
) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
    values.iter().filter_map(move |(key, value)| {
        if OVERRIDABLE_KEYS.contains(&key.as_str()) {
            Some((key.as_str(), value))
        } else {
            warn!(target_name = %target, key = %key, "Ignoring override of a protected key");
            None
        }
    })
}

fn set_bool(slot: &mut bool, value: &Value) -> bool {
    match value.as_bool() {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

fn set_cadence(slot: &mut EmailCadence, value: &Value) -> bool {
    match value.as_str().and_then(|s| s.parse().ok()) {
        Some(cadence) => {
            *slot = cadence;
            true
        }
        None => false,
    }
}

fn set_channels(slot: &mut Vec<Channel>, value: &Value) -> bool {
    match serde_json::from_value::<Vec<Channel>>(value.clone()) {
        Ok(channels) => {
            *slot = channels;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> OverrideValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_type_override_applies_allowed_keys_only() {
        let builtin = PreferenceSchema::builtin();
        let mut types = BTreeMap::new();
        types.insert(
            "new_discussion_post".to_string(),
            values(&[
                ("web", json!(true)),
                ("email_cadence", json!("Weekly")),
                ("is_core", json!(true)),
                ("info", json!("changed")),
            ]),
        );
        let schema = apply_overrides(&builtin, &types, &BTreeMap::new());
        let post = schema.notification_type("new_discussion_post").expect("type");
        assert!(post.web);
        assert_eq!(post.email_cadence, EmailCadence::Weekly);
        assert!(!post.is_core);
        assert_ne!(post.info, "changed");
    }

    #[test]
    fn test_builtin_is_not_mutated() {
        let builtin = PreferenceSchema::builtin();
        let snapshot = builtin.clone();
        let mut apps = BTreeMap::new();
        apps.insert(
            "discussion".to_string(),
            values(&[("email", json!(false)), ("non_editable", json!(["email"]))]),
        );
        let schema = apply_overrides(&builtin, &BTreeMap::new(), &apps);
        assert_eq!(builtin, snapshot);
        let discussion = schema.app("discussion").expect("app");
        assert!(!discussion.core_email);
        assert_eq!(discussion.non_editable, vec![Channel::Email]);
    }

    #[test]
    fn test_malformed_and_unknown_overrides_ignored() {
        let builtin = PreferenceSchema::builtin();
        let mut types = BTreeMap::new();
        types.insert("ora_grade_assigned".to_string(), values(&[("email", json!("no"))]));
        types.insert("does_not_exist".to_string(), values(&[("web", json!(true))]));
        let mut apps = BTreeMap::new();
        apps.insert("updates".to_string(), values(&[("email_cadence", json!("Mixed"))]));
        let schema = apply_overrides(&builtin, &types, &apps);
        assert_eq!(schema, builtin);
    }
}
