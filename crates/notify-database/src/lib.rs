//! # notify-database
//!
//! Storage seams for the notification delivery core. The [`store`] traits
//! are implemented by the PostgreSQL repositories in [`repositories`] and by
//! the in-process [`memory::MemoryStore`].

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{CourseCatalog, JobStore, NotificationStore, PreferenceStore, UserDirectory};
