//! In-app notifications: fan-out, grouping and the tray API.

pub mod dispatcher;
pub mod grouping;
pub mod service;

pub use dispatcher::{DispatchSummary, NotificationDispatcher, SendRequest};
pub use grouping::{Grouper, GroupingRegistry};
pub use service::{NotificationCount, NotificationService, NotificationView, StatusMessage};
