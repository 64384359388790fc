//! Digest scheduling and retry settings.

use serde::{Deserialize, Serialize};

/// Cron expressions and retry policy for the email digest jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Six-field cron expression for the daily digest.
    #[serde(default = "default_daily_cron")]
    pub daily_cron: String,
    /// Six-field cron expression for the weekly digest.
    #[serde(default = "default_weekly_cron")]
    pub weekly_cron: String,
    /// Six-field cron expression for the expiry reaper.
    #[serde(default = "default_reaper_cron")]
    pub reaper_cron: String,
    /// First retry delay of a buffered digest, in seconds.
    #[serde(default = "default_retry_base")]
    pub retry_base_seconds: u64,
    /// Multiplier applied to the delay on every further retry.
    #[serde(default = "default_retry_factor")]
    pub retry_factor: u32,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            daily_cron: default_daily_cron(),
            weekly_cron: default_weekly_cron(),
            reaper_cron: default_reaper_cron(),
            retry_base_seconds: default_retry_base(),
            retry_factor: default_retry_factor(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_daily_cron() -> String {
    "0 0 17 * * *".to_string()
}

fn default_weekly_cron() -> String {
    "0 0 17 * * Mon".to_string()
}

fn default_reaper_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_retry_base() -> u64 {
    60
}

fn default_retry_factor() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    3
}
