//! Notification preferences: storage access, migration, aggregation and
//! installation overrides.

pub mod aggregate;
pub mod overrides;
pub mod patch;
pub mod service;
pub mod sync;
pub mod visibility;

pub use aggregate::aggregate;
pub use overrides::apply_overrides;
pub use patch::{apply_update, parse_update};
pub use service::{
    AggregatePreferences, CourseConfiguration, CourseUpdateError, PreferenceService,
    UpdateAllResult,
};
pub use sync::sync;
