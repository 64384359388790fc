//! The process-wide notification preference schema.
//!
//! A schema declares every notification app and type together with their
//! default channel settings. Per-course configs are derived from it with
//! [`PreferenceSchema::default_config`] and migrated whenever
//! [`PreferenceSchema::version`] changes.

mod builtin;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use notify_core::error::AppError;
use notify_core::result::AppResult;

use crate::preference::{
    AppPreference, CORE_TYPE_KEY, Channel, EmailCadence, PreferenceConfig, TypePreference,
};
use crate::user::CourseRole;

/// Version of the built-in schema.
pub const SCHEMA_VERSION: i32 = 1;

/// Declaration of one notification app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDefinition {
    /// App name.
    pub name: String,
    /// Whether the app delivers by default.
    pub enabled: bool,
    /// Default web flag of core types.
    pub core_web: bool,
    /// Default email flag of core types.
    pub core_email: bool,
    /// Default push flag of core types.
    pub core_push: bool,
    /// Default cadence of core types.
    pub core_email_cadence: EmailCadence,
    /// Help text of the core entry.
    pub core_info: String,
    /// Channels users may not change on the core entry.
    pub non_editable: Vec<Channel>,
}

/// Declaration of one notification type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Type name.
    pub name: String,
    /// Owning app.
    pub app: String,
    /// Resolves through the app's core entry.
    pub is_core: bool,
    /// Default web flag.
    pub web: bool,
    /// Default email flag.
    pub email: bool,
    /// Default push flag.
    pub push: bool,
    /// Default cadence.
    pub email_cadence: EmailCadence,
    /// Channels users may not change.
    pub non_editable: Vec<Channel>,
    /// Roles required to receive or configure the type.
    pub visible_to: Option<Vec<CourseRole>>,
    /// Help text.
    pub info: String,
    /// Template with `{field}` placeholders.
    pub content_template: String,
    /// Context fields the producer must supply.
    pub content_context_fields: Vec<String>,
}

impl TypeDefinition {
    /// Whether a user with `roles` may see the type.
    pub fn visible_for(&self, roles: &[CourseRole]) -> bool {
        match &self.visible_to {
            None => true,
            Some(allowed) => allowed.iter().any(|role| roles.contains(role)),
        }
    }
}

/// All apps and types known to the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSchema {
    /// Version stamped on configs written against this schema.
    pub version: i32,
    /// Apps in declaration order.
    pub apps: Vec<AppDefinition>,
    /// Types in declaration order.
    pub types: Vec<TypeDefinition>,
}

impl PreferenceSchema {
    /// The built-in schema.
    pub fn builtin() -> Self {
        builtin::schema()
    }

    /// Check that every type belongs to a declared app.
    pub fn validate(&self) -> AppResult<()> {
        for definition in &self.types {
            if self.app(&definition.app).is_none() {
                return Err(AppError::configuration(format!(
                    "Notification type '{}' references unknown app '{}'",
                    definition.name, definition.app
                )));
            }
        }
        Ok(())
    }

    /// Look up an app.
    pub fn app(&self, name: &str) -> Option<&AppDefinition> {
        self.apps.iter().find(|app| app.name == name)
    }

    /// Look up a type.
    pub fn notification_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up a type, failing with `UnknownType`.
    pub fn require_type(&self, name: &str) -> AppResult<&TypeDefinition> {
        self.notification_type(name)
            .ok_or_else(|| AppError::unknown_type(name))
    }

    /// Look up an app, failing with `UnknownApp`.
    pub fn require_app(&self, name: &str) -> AppResult<&AppDefinition> {
        self.app(name).ok_or_else(|| AppError::unknown_app(name))
    }

    /// Names of all apps.
    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(|app| app.name.as_str())
    }

    /// Types of one app.
    pub fn types_of<'a>(&'a self, app: &'a str) -> impl Iterator<Item = &'a TypeDefinition> {
        self.types.iter().filter(move |t| t.app == app)
    }

    /// Core type names of one app, in declaration order.
    pub fn core_types(&self, app: &str) -> Vec<String> {
        self.types_of(app)
            .filter(|t| t.is_core)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Default settings of the core entry of an app.
    pub fn core_defaults(&self, app: &AppDefinition) -> TypePreference {
        TypePreference {
            web: app.core_web,
            email: app.core_email,
            push: app.core_push,
            email_cadence: app.core_email_cadence,
            info: None,
        }
    }

    /// Default settings of a type, resolving core types via the app.
    pub fn type_defaults(&self, definition: &TypeDefinition) -> TypePreference {
        if definition.is_core {
            if let Some(app) = self.app(&definition.app) {
                return self.core_defaults(app);
            }
        }
        TypePreference {
            web: definition.web,
            email: definition.email,
            push: definition.push,
            email_cadence: definition.email_cadence,
            info: None,
        }
    }

    /// Build the default per-course configuration.
    pub fn default_config(&self) -> PreferenceConfig {
        let mut apps = BTreeMap::new();
        for app in &self.apps {
            let mut notification_types = BTreeMap::new();
            let mut non_editable = BTreeMap::new();
            for definition in self.types_of(&app.name).filter(|t| !t.is_core) {
                notification_types.insert(definition.name.clone(), self.type_defaults(definition));
                if !definition.non_editable.is_empty() {
                    non_editable.insert(definition.name.clone(), definition.non_editable.clone());
                }
            }
            notification_types.insert(CORE_TYPE_KEY.to_string(), self.core_defaults(app));
            if !app.non_editable.is_empty() {
                non_editable.insert(CORE_TYPE_KEY.to_string(), app.non_editable.clone());
            }
            apps.insert(
                app.name.clone(),
                AppPreference {
                    enabled: app.enabled,
                    core_notification_types: self.core_types(&app.name),
                    notification_types,
                    non_editable,
                },
            );
        }
        PreferenceConfig { apps }
    }

    /// Help text of a config entry (`core` or a type name).
    pub fn info_for(&self, app: &str, entry: &str) -> Option<&str> {
        if entry == CORE_TYPE_KEY {
            return self.app(app).map(|a| a.core_info.as_str());
        }
        self.notification_type(entry).map(|t| t.info.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = PreferenceSchema::builtin();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.version, SCHEMA_VERSION);
        let apps: Vec<&str> = schema.app_names().collect();
        assert_eq!(apps, vec!["discussion", "updates", "grading"]);
    }

    #[test]
    fn test_default_config_shape() {
        let config = PreferenceSchema::builtin().default_config();
        let discussion = config.app("discussion").expect("discussion");
        assert_eq!(discussion.core_notification_types.len(), 7);
        assert_eq!(discussion.core_notification_types[0], "new_comment_on_response");
        assert!(discussion.notification_types.contains_key(CORE_TYPE_KEY));
        assert!(!discussion.notification_types.contains_key("new_response"));
        let post = &discussion.notification_types["new_discussion_post"];
        assert!(!post.web && !post.email && !post.push);
        assert_eq!(
            discussion.non_editable["new_discussion_post"],
            vec![Channel::Push]
        );

        let grading = config.app("grading").expect("grading");
        assert!(grading.core_notification_types.is_empty());
        assert!(grading.notification_types["ora_grade_assigned"].email);
        assert!(!grading.notification_types["ora_staff_notifications"].email);
    }

    #[test]
    fn test_dangling_app_fails_validation() {
        let mut schema = PreferenceSchema::builtin();
        schema.types[0].app = "missing".to_string();
        let err = schema.validate().expect_err("invalid");
        assert_eq!(err.kind, notify_core::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_visibility_by_role() {
        let schema = PreferenceSchema::builtin();
        let reported = schema.notification_type("content_reported").expect("type");
        assert!(!reported.visible_for(&[]));
        assert!(reported.visible_for(&[CourseRole::ForumModerator]));
        assert!(!reported.visible_for(&[CourseRole::CourseStaff]));
        let response = schema.notification_type("new_response").expect("type");
        assert!(response.visible_for(&[]));
    }
}
