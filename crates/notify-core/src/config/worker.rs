//! Job worker settings.

use serde::{Deserialize, Serialize};

/// Settings of the in-process job worker that runs buffered digests,
/// cadence digests and retention jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Start the worker and cron scheduler alongside the HTTP server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Jobs executed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seconds to sleep when no job is due.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Queues polled, in priority order.
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
    /// Seconds in-flight jobs get to finish after shutdown is requested.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            queues: default_queues(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5
}

fn default_queues() -> Vec<String> {
    vec!["email".to_string(), "maintenance".to_string()]
}

fn default_drain_timeout() -> u64 {
    30
}
