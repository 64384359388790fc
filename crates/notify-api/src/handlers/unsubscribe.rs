//! One-click unsubscribe handlers.
//!
//! Every accepted request answers 200 with the same body whether or not
//! the tokens decoded to an existing user.

use axum::Json;
use axum::extract::{Path, State};

use notify_core::error::AppError;
use notify_service::unsubscribe::UnsubscribeOutcome;

use crate::dto::response::UnsubscribeResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// GET|POST /api/preferences-unsubscribe/{username_token}/{patch_token}
pub async fn unsubscribe_scoped(
    State(state): State<AppState>,
    Path((username_token, patch_token)): Path<(String, String)>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    handle(&state, &username_token, Some(&patch_token)).await
}

/// GET|POST /api/preferences-unsubscribe/{username_token}
pub async fn unsubscribe_all(
    State(state): State<AppState>,
    Path(username_token): Path<String>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    handle(&state, &username_token, None).await
}

async fn handle(
    state: &AppState,
    username_token: &str,
    patch_token: Option<&str>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    if !state.unsubscribe_limiter.check(username_token) {
        return Err(AppError::rate_limited("Too many unsubscribe requests").into());
    }

    match state.unsubscribe.unsubscribe(username_token, patch_token).await? {
        UnsubscribeOutcome::Applied(changed) => {
            tracing::debug!(changed, "Unsubscribe applied");
        }
        UnsubscribeOutcome::Ignored => {
            tracing::debug!("Unsubscribe ignored");
        }
    }
    Ok(Json(UnsubscribeResponse::accepted()))
}
