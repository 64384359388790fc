//! User directory entities.

pub mod model;
pub mod role;

pub use model::{CourseSummary, UserProfile};
pub use role::CourseRole;
