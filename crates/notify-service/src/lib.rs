//! # notify-service
//!
//! Business logic of the notification delivery core. Each service
//! orchestrates the storage traits from `notify-database` to implement one
//! use case: preference management, fan-out, the email decision engine,
//! digests, one-click unsubscribe and retention.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod context;
pub mod email;
pub mod events;
pub mod flags;
pub mod notification;
pub mod preference;
pub mod retention;
pub mod unsubscribe;

#[cfg(test)]
mod testing;

pub use context::RequestContext;
pub use email::{
    DigestService, EmailDecisionEngine, LogMailer, Mailer, MemoryMailer, OutgoingEmail,
    SmtpMailer,
};
pub use events::EventBus;
pub use flags::{ConfigFeatureFlags, FeatureFlags};
pub use notification::{GroupingRegistry, NotificationDispatcher, NotificationService, SendRequest};
pub use preference::{PreferenceService, apply_overrides};
pub use retention::RetentionService;
pub use unsubscribe::{TokenCipher, UnsubscribeService};
