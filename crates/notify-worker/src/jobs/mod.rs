//! Built-in job handler implementations.

pub mod digest;
pub mod retention;

use std::sync::Arc;

use notify_service::{DigestService, RetentionService};

use crate::executor::JobExecutor;

pub use digest::{BufferedDigestJobHandler, DigestJobHandler};
pub use retention::{DeleteExpiredJobHandler, DeleteNotificationsJobHandler};

/// Executor with every built-in handler registered.
pub fn default_executor(digests: DigestService, retention: RetentionService) -> JobExecutor {
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(DigestJobHandler::new(digests.clone())));
    executor.register(Arc::new(BufferedDigestJobHandler::new(digests)));
    executor.register(Arc::new(DeleteExpiredJobHandler::new(retention.clone())));
    executor.register(Arc::new(DeleteNotificationsJobHandler::new(retention)));
    executor
}
