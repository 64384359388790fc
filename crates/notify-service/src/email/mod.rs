//! Email delivery: the immediate-email decision engine, digests, rendering
//! and transports.

pub mod decision;
pub mod digest;
pub mod mailer;
pub mod render;

pub use decision::{EmailDecisionEngine, decide};
pub use digest::{BufferedDigestOutcome, DigestRun, DigestService, digest_window};
pub use mailer::{LogMailer, Mailer, MemoryMailer, OutgoingEmail, SmtpMailer, mailer_from_config};
pub use render::{EmailRenderer, render_template};
