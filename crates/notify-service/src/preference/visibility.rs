//! Role-based hiding of restricted notification types.

use notify_entity::preference::PreferenceConfig;
use notify_entity::schema::PreferenceSchema;
use notify_entity::user::CourseRole;

/// Remove entries the user may not see given `roles`.
pub fn filter_visible<C>(
    config: &mut PreferenceConfig<C>,
    schema: &PreferenceSchema,
    roles: &[CourseRole],
) {
    for app in config.apps.values_mut() {
        let hidden: Vec<String> = app
            .notification_types
            .keys()
            .filter(|entry| {
                schema
                    .notification_type(entry)
                    .is_some_and(|definition| !definition.visible_for(roles))
            })
            .cloned()
            .collect();
        for entry in hidden {
            app.notification_types.remove(&entry);
            app.non_editable.remove(&entry);
        }
    }
}

/// Attach the schema help text to every entry.
pub fn merge_info<C>(config: &mut PreferenceConfig<C>, schema: &PreferenceSchema) {
    for (app_name, app) in config.apps.iter_mut() {
        for (entry, pref) in app.notification_types.iter_mut() {
            pref.info = schema.info_for(app_name, entry).map(str::to_string);
        }
    }
}
