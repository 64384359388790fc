//! Unified application error types.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Authentication failed (missing or invalid bearer token).
    Authentication,
    /// The caller is not allowed to perform the action.
    Forbidden,
    /// Input validation failed.
    Validation,
    /// The template context is missing fields declared by the notification type.
    InvalidContext,
    /// The notification type is not part of the preference schema.
    UnknownType,
    /// The app is not part of the preference schema.
    UnknownApp,
    /// A preference mutation was attempted against an outdated config version.
    StaleConfigVersion,
    /// A rate limit was exceeded.
    RateLimit,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A retryable storage failure (serialization failure, deadlock).
    TransientStorage,
    /// A retryable email transport failure.
    Transport,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Forbidden => write!(f, "FORBIDDEN"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::InvalidContext => write!(f, "INVALID_CONTEXT"),
            Self::UnknownType => write!(f, "UNKNOWN_TYPE"),
            Self::UnknownApp => write!(f, "UNKNOWN_APP"),
            Self::StaleConfigVersion => write!(f, "STALE_CONFIG_VERSION"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::TransientStorage => write!(f, "TRANSIENT_STORAGE"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified application error.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an invalid-context error.
    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidContext, message)
    }

    /// Create an unknown-type error.
    pub fn unknown_type(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownType,
            format!("Unknown notification type '{name}'"),
        )
    }

    /// Create an unknown-app error.
    pub fn unknown_app(name: &str) -> Self {
        Self::new(ErrorKind::UnknownApp, format!("Unknown notification app '{name}'"))
    }

    /// Create a stale-config-version error.
    pub fn stale_config_version(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StaleConfigVersion, message)
    }

    /// Create a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::TransientStorage | ErrorKind::Transport)
    }

    /// Map a sqlx error, classifying serialization failures, deadlocks and
    /// lock timeouts (SQLSTATE `40001`, `40P01`, `55P03`) as transient.
    #[cfg(feature = "sqlx")]
    pub fn from_sqlx(message: impl Into<String>, err: sqlx::Error) -> Self {
        let transient = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| matches!(code.as_ref(), "40001" | "40P01" | "55P03"));
        let kind = if transient {
            ErrorKind::TransientStorage
        } else {
            ErrorKind::Database
        };
        Self::with_source(kind, message, err)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
