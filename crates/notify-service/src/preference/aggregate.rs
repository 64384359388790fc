//! Merge of many course configs into one account-level view.

use std::collections::BTreeSet;

use notify_entity::preference::{AggregatedConfig, CadenceView, EmailCadence, PreferenceConfig};
use notify_entity::schema::PreferenceSchema;

/// Aggregate the per-course configs of one user.
///
/// The first config is the base. Channel flags are OR-ed across inputs,
/// core type lists are unioned, and cadences collapse to `Mixed` when the
/// inputs disagree. Apps and entries unknown to the schema are dropped.
/// An empty input yields the schema defaults.
pub fn aggregate(configs: &[PreferenceConfig], schema: &PreferenceSchema) -> AggregatedConfig {
    let defaults = schema.default_config();
    let Some(first) = configs.first() else {
        return defaults.to_view();
    };

    let mut base = first.to_view();
    base.apps.retain(|name, _| defaults.apps.contains_key(name));
    for (app_name, app) in base.apps.iter_mut() {
        if let Some(known) = defaults.app(app_name) {
            app.notification_types
                .retain(|entry, _| known.notification_types.contains_key(entry));
        }
    }

    for (app_name, app) in base.apps.iter_mut() {
        let others: Vec<_> = configs[1..]
            .iter()
            .filter_map(|config| config.app(app_name))
            .collect();

        for other in &others {
            for core_type in &other.core_notification_types {
                if !app.core_notification_types.contains(core_type) {
                    app.core_notification_types.push(core_type.clone());
                }
            }
        }

        for (entry, pref) in app.notification_types.iter_mut() {
            let mut cadences: BTreeSet<EmailCadence> =
                pref.email_cadence.concrete().into_iter().collect();
            for other in others
                .iter()
                .filter_map(|other| other.notification_types.get(entry))
            {
                pref.web |= other.web;
                pref.email |= other.email;
                pref.push |= other.push;
                cadences.insert(other.email_cadence);
            }
            pref.email_cadence = match cadences.len() {
                1 => cadences
                    .into_iter()
                    .next()
                    .map_or(CadenceView::Mixed, CadenceView::from),
                _ => CadenceView::Mixed,
            };
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_entity::preference::CORE_TYPE_KEY;

    fn with_core(email: bool, cadence: EmailCadence) -> PreferenceConfig {
        let mut config = PreferenceSchema::builtin().default_config();
        let core = config
            .app_mut("discussion")
            .and_then(|a| a.notification_types.get_mut(CORE_TYPE_KEY))
            .expect("core");
        core.email = email;
        core.email_cadence = cadence;
        config
    }

    #[test]
    fn test_divergent_cadence_is_mixed_and_email_is_or() {
        let schema = PreferenceSchema::builtin();
        let view = aggregate(
            &[
                with_core(true, EmailCadence::Daily),
                with_core(false, EmailCadence::Weekly),
            ],
            &schema,
        );
        let new_comment = view.resolve("discussion", "new_comment").expect("resolved");
        assert!(new_comment.email);
        assert_eq!(new_comment.email_cadence, CadenceView::Mixed);
    }

    #[test]
    fn test_agreeing_cadence_is_kept() {
        let schema = PreferenceSchema::builtin();
        let view = aggregate(
            &[
                with_core(false, EmailCadence::Weekly),
                with_core(false, EmailCadence::Weekly),
                with_core(false, EmailCadence::Weekly),
            ],
            &schema,
        );
        let core = view.resolve("discussion", "new_response").expect("resolved");
        assert!(!core.email);
        assert_eq!(core.email_cadence, CadenceView::Weekly);
    }

    #[test]
    fn test_singleton_is_identity() {
        let schema = PreferenceSchema::builtin();
        let config = with_core(true, EmailCadence::Immediately);
        assert_eq!(aggregate(std::slice::from_ref(&config), &schema), config.to_view());
    }

    #[test]
    fn test_unknown_apps_and_entries_dropped() {
        let schema = PreferenceSchema::builtin();
        let mut config = schema.default_config();
        let mut rogue = config.apps["updates"].clone();
        rogue.notification_types.clear();
        config.apps.insert("rogue".to_string(), rogue);
        let stray = config.apps["updates"].notification_types["course_updates"].clone();
        config
            .app_mut("updates")
            .expect("updates")
            .notification_types
            .insert("stray".to_string(), stray);

        let view = aggregate(&[config], &schema);
        assert!(view.app("rogue").is_none());
        assert!(
            !view.apps["updates"]
                .notification_types
                .contains_key("stray")
        );
    }

    #[test]
    fn test_empty_input_yields_defaults() {
        let schema = PreferenceSchema::builtin();
        assert_eq!(aggregate(&[], &schema), schema.default_config().to_view());
    }
}
