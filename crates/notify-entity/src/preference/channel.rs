//! Delivery channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Delivery medium for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// In-app tray.
    Web,
    /// Email.
    Email,
    /// Mobile push.
    Push,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Channel; 3] = [Channel::Web, Channel::Email, Channel::Push];

    /// Return the channel as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Email => "email",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            other => Err(format!("Invalid notification channel '{other}'")),
        }
    }
}
