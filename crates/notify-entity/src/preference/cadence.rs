//! Email cadence values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often emails for a notification type are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_cadence")]
pub enum EmailCadence {
    /// Included in the daily digest.
    Daily,
    /// Included in the weekly digest.
    Weekly,
    /// Sent right away, buffered during bursts.
    Immediately,
    /// Never emailed.
    Never,
}

impl EmailCadence {
    /// Return the cadence as its wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Immediately => "Immediately",
            Self::Never => "Never",
        }
    }
}

impl fmt::Display for EmailCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Daily" => Ok(Self::Daily),
            "Weekly" => Ok(Self::Weekly),
            "Immediately" => Ok(Self::Immediately),
            "Never" => Ok(Self::Never),
            other => Err(format!("Invalid email cadence '{other}'")),
        }
    }
}

/// Cadence as shown in aggregated views.
///
/// `Mixed` is produced when courses disagree and is never accepted on write:
/// it has no [`EmailCadence`] counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CadenceView {
    /// All inputs were `Daily`.
    Daily,
    /// All inputs were `Weekly`.
    Weekly,
    /// All inputs were `Immediately`.
    Immediately,
    /// All inputs were `Never`.
    Never,
    /// Inputs disagreed.
    Mixed,
}

impl CadenceView {
    /// Return the cadence as its wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Immediately => "Immediately",
            Self::Never => "Never",
            Self::Mixed => "Mixed",
        }
    }

    /// The concrete cadence, if the view is not `Mixed`.
    pub fn concrete(&self) -> Option<EmailCadence> {
        match self {
            Self::Daily => Some(EmailCadence::Daily),
            Self::Weekly => Some(EmailCadence::Weekly),
            Self::Immediately => Some(EmailCadence::Immediately),
            Self::Never => Some(EmailCadence::Never),
            Self::Mixed => None,
        }
    }
}

impl From<EmailCadence> for CadenceView {
    fn from(cadence: EmailCadence) -> Self {
        match cadence {
            EmailCadence::Daily => Self::Daily,
            EmailCadence::Weekly => Self::Weekly,
            EmailCadence::Immediately => Self::Immediately,
            EmailCadence::Never => Self::Never,
        }
    }
}

impl fmt::Display for CadenceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
