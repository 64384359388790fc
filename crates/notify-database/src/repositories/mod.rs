//! PostgreSQL implementations of the storage traits.

pub mod directory;
pub mod job;
pub mod notification;
pub mod preference;

pub use directory::DirectoryRepository;
pub use job::JobRepository;
pub use notification::NotificationRepository;
pub use preference::PreferenceRepository;
