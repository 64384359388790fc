//! One-click unsubscribe: opaque tokens and the preference mutation they
//! authorize.

pub mod service;
pub mod token;

pub use service::{UnsubscribeOutcome, UnsubscribeService};
pub use token::TokenCipher;
