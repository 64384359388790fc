//! Notification preference entities and value objects.

pub mod account;
pub mod cadence;
pub mod channel;
pub mod config;
pub mod course;
pub mod patch;

pub use account::{AccountPreference, AccountPreferenceValues};
pub use cadence::{CadenceView, EmailCadence};
pub use channel::Channel;
pub use config::{AggregatedConfig, AppPreference, CORE_TYPE_KEY, PreferenceConfig, TypePreference};
pub use course::{ConfigMigration, CoursePreference};
pub use patch::{PreferenceUpdate, UnsubscribePatch};
