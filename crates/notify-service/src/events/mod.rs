//! In-process publication of notification events.

pub mod bus;

pub use bus::EventBus;
