//! Notification domain entities.

pub mod email;
pub mod filter;
pub mod model;

pub use email::{DecisionFn, EmailAction, EmailWindow};
pub use filter::{CreatedRange, DeleteFilter, ListFilter, MAX_DELETE_WINDOW_DAYS};
pub use model::{ContentContext, NewNotification, Notification};
