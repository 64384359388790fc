//! Log output settings.

use serde::{Deserialize, Serialize};

/// Output encoding of log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Log filter and format. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"debug,sqlx=warn"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// See [`LogFormat`].
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info,sqlx=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_is_lowercase_on_the_wire() {
        let config: LoggingConfig =
            serde_json::from_value(serde_json::json!({ "format": "compact" })).expect("config");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, "info,sqlx=warn");
    }
}
