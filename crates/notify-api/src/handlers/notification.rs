//! Notification tray handlers.

use axum::Json;
use axum::extract::{Path, Query, State};

use notify_core::types::PageResponse;
use notify_service::notification::{NotificationCount, NotificationView, StatusMessage};

use crate::dto::request::{MarkReadRequest, NotificationListQuery};
use crate::error::ApiError;
use crate::extractors::{AuthUser, PaginationParams};
use crate::state::AppState;

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationListQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<NotificationView>>, ApiError> {
    let tray_opened = query.tray_opened();
    let page = state
        .notifications
        .list(&auth, query.app_name, tray_opened, params.into_page_request())
        .await?;
    Ok(Json(page))
}

/// GET /api/count
pub async fn count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<NotificationCount>, ApiError> {
    Ok(Json(state.notifications.count(&auth).await?))
}

/// PATCH /api/notifications/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let message = state
        .notifications
        .mark_read(&auth, req.notification_id, req.app_name.as_deref())
        .await?;
    Ok(Json(message))
}

/// PATCH /api/notifications/{app_name}/seen
pub async fn mark_seen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(app_name): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    Ok(Json(state.notifications.mark_seen(&auth, &app_name).await?))
}
