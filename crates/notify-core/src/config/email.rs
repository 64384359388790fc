//! Outbound email configuration.

use serde::{Deserialize, Serialize};

/// Which transport delivers notification emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransportKind {
    /// SMTP relay with STARTTLS.
    Smtp,
    /// Write rendered emails to the log instead of sending them.
    Log,
}

/// SMTP and message envelope settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Transport used for delivery.
    #[serde(default = "default_transport")]
    pub transport: EmailTransportKind,
    /// SMTP server hostname.
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Optional SMTP username.
    #[serde(default)]
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// RFC 5322 "From" address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Platform name used in subjects and footers.
    #[serde(default = "default_platform_name")]
    pub platform_name: String,
    /// Public base URL used to build links (unsubscribe, notification URLs).
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_password: None,
            from_address: default_from_address(),
            platform_name: default_platform_name(),
            site_url: default_site_url(),
        }
    }
}

fn default_transport() -> EmailTransportKind {
    EmailTransportKind::Log
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "no-reply@example.org".to_string()
}

fn default_platform_name() -> String {
    "Learning Platform".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}
