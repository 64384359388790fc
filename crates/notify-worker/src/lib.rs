//! Background job processing and scheduled tasks for notification delivery.
//!
//! This crate provides:
//! - A job queue over the `JobStore` with retry rescheduling
//! - A worker runner that polls queues and executes claimed jobs
//! - A cron scheduler that enqueues the daily and weekly digests and the
//!   expiry reaper
//! - Job handlers for digests and retention

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{JobQueue, QueueStats};
pub use runner::{RetryPolicy, WorkerRunner};
pub use scheduler::CronScheduler;

#[cfg(test)]
mod testing;
