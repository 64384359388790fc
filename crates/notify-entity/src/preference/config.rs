//! Typed per-course preference configuration.
//!
//! The stored JSON document has the shape
//!
//! ```json
//! {
//!   "discussion": {
//!     "enabled": true,
//!     "core_notification_types": ["new_response", "..."],
//!     "notification_types": {
//!       "core": { "web": true, "email": true, "push": true, "email_cadence": "Daily" },
//!       "new_discussion_post": { "web": false, "email": false, "push": false, "email_cadence": "Daily" }
//!     },
//!     "non_editable": { "new_discussion_post": ["push"] }
//!   }
//! }
//! ```
//!
//! The same structs parameterized over [`CadenceView`] describe the
//! aggregated account view, whose cadences may be `Mixed`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cadence::{CadenceView, EmailCadence};
use super::channel::Channel;

/// Key of the entry that carries the shared settings of core types.
pub const CORE_TYPE_KEY: &str = "core";

/// Channel and cadence settings of one notification type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePreference<C = EmailCadence> {
    /// In-app delivery.
    pub web: bool,
    /// Email delivery.
    pub email: bool,
    /// Push delivery.
    pub push: bool,
    /// Email cadence.
    pub email_cadence: C,
    /// Help text merged from the schema for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl<C> TypePreference<C> {
    /// Read one channel flag.
    pub fn channel(&self, channel: Channel) -> bool {
        match channel {
            Channel::Web => self.web,
            Channel::Email => self.email,
            Channel::Push => self.push,
        }
    }

    /// Write one channel flag.
    pub fn set_channel(&mut self, channel: Channel, value: bool) {
        match channel {
            Channel::Web => self.web = value,
            Channel::Email => self.email = value,
            Channel::Push => self.push = value,
        }
    }

    /// Whether any channel is on.
    pub fn any_channel(&self) -> bool {
        self.web || self.email || self.push
    }
}

/// Settings of one notification app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "C: Deserialize<'de>"))]
pub struct AppPreference<C = EmailCadence> {
    /// Whether the app delivers at all.
    pub enabled: bool,
    /// Types that resolve through the `core` entry.
    #[serde(default)]
    pub core_notification_types: Vec<String>,
    /// Per-type settings, including the `core` entry.
    #[serde(default)]
    pub notification_types: BTreeMap<String, TypePreference<C>>,
    /// Channels the user may not change, per type.
    #[serde(default)]
    pub non_editable: BTreeMap<String, Vec<Channel>>,
}

impl<C> AppPreference<C> {
    /// Whether a type resolves through the `core` entry.
    pub fn is_core(&self, notification_type: &str) -> bool {
        self.core_notification_types
            .iter()
            .any(|t| t == notification_type)
    }

    /// Resolve the effective settings of a type.
    pub fn resolve(&self, notification_type: &str) -> Option<&TypePreference<C>> {
        if self.is_core(notification_type) {
            self.notification_types.get(CORE_TYPE_KEY)
        } else {
            self.notification_types.get(notification_type)
        }
    }

    /// Whether a channel is locked for a type.
    pub fn is_non_editable(&self, notification_type: &str, channel: Channel) -> bool {
        self.non_editable
            .get(notification_type)
            .is_some_and(|channels| channels.contains(&channel))
    }
}

/// Per-course preference configuration keyed by app name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceConfig<C = EmailCadence> {
    /// App settings keyed by app name.
    pub apps: BTreeMap<String, AppPreference<C>>,
}

/// Aggregated account-level view.
pub type AggregatedConfig = PreferenceConfig<CadenceView>;

impl<C> Default for PreferenceConfig<C> {
    fn default() -> Self {
        Self {
            apps: BTreeMap::new(),
        }
    }
}

impl<C> PreferenceConfig<C> {
    /// Look up an app.
    pub fn app(&self, app_name: &str) -> Option<&AppPreference<C>> {
        self.apps.get(app_name)
    }

    /// Look up an app mutably.
    pub fn app_mut(&mut self, app_name: &str) -> Option<&mut AppPreference<C>> {
        self.apps.get_mut(app_name)
    }

    /// Resolve the effective settings of a type in an app.
    pub fn resolve(&self, app_name: &str, notification_type: &str) -> Option<&TypePreference<C>> {
        self.app(app_name)?.resolve(notification_type)
    }

    /// Whether the app is enabled and the type has any channel switched on.
    pub fn is_deliverable(&self, app_name: &str, notification_type: &str) -> bool {
        self.app(app_name).is_some_and(|app| {
            app.enabled
                && app
                    .resolve(notification_type)
                    .is_some_and(TypePreference::any_channel)
        })
    }
}

impl PreferenceConfig<EmailCadence> {
    /// Decode a stored JSON document.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Encode for storage.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Widen to the aggregated representation.
    pub fn to_view(&self) -> AggregatedConfig {
        PreferenceConfig {
            apps: self
                .apps
                .iter()
                .map(|(name, app)| {
                    let types = app
                        .notification_types
                        .iter()
                        .map(|(type_name, pref)| {
                            (
                                type_name.clone(),
                                TypePreference {
                                    web: pref.web,
                                    email: pref.email,
                                    push: pref.push,
                                    email_cadence: CadenceView::from(pref.email_cadence),
                                    info: pref.info.clone(),
                                },
                            )
                        })
                        .collect();
                    (
                        name.clone(),
                        AppPreference {
                            enabled: app.enabled,
                            core_notification_types: app.core_notification_types.clone(),
                            notification_types: types,
                            non_editable: app.non_editable.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}
