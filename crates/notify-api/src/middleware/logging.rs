//! Per-request access log.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

const UNSUBSCRIBE_PREFIX: &str = "/api/preferences-unsubscribe/";

/// Logs method, path, status and latency of every request.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = loggable_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    if response.status().is_server_error() {
        warn!(%method, %path, status, duration_ms, "HTTP request failed");
    } else {
        info!(%method, %path, status, duration_ms, "HTTP request");
    }

    response
}

/// Request path with unsubscribe tokens masked.
fn loggable_path(path: &str) -> String {
    match path.strip_prefix(UNSUBSCRIBE_PREFIX) {
        Some(tokens) => {
            let masked = tokens.split('/').map(|_| "***").collect::<Vec<_>>().join("/");
            format!("{UNSUBSCRIBE_PREFIX}{masked}")
        }
        None => path.to_string(),
    }
}
