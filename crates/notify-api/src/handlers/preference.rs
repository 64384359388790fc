//! Preference handlers.

use axum::Json;
use axum::extract::{Path, State};

use notify_core::types::CourseKey;
use notify_service::preference::{AggregatePreferences, CourseConfiguration, UpdateAllResult};

use crate::dto::request::PreferencePatchRequest;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/configurations/{course_id}
pub async fn get_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<String>,
) -> Result<Json<CourseConfiguration>, ApiError> {
    let config = state
        .preferences
        .configuration(&auth, &CourseKey::new(course_id))
        .await?;
    Ok(Json(config))
}

/// PATCH /api/configurations/{course_id}
pub async fn patch_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<PreferencePatchRequest>,
) -> Result<Json<CourseConfiguration>, ApiError> {
    let update = req.into_update()?;
    let config = state
        .preferences
        .update(&auth, &CourseKey::new(course_id), &update, req.config_version)
        .await?;
    Ok(Json(config))
}

/// POST /api/preferences/update-all
pub async fn update_all(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PreferencePatchRequest>,
) -> Result<Json<UpdateAllResult>, ApiError> {
    let update = req.into_update()?;
    let result = state.preferences.update_all(&auth, &update).await?;
    Ok(Json(result))
}

/// GET /api/aggregate
pub async fn aggregate(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AggregatePreferences>, ApiError> {
    Ok(Json(state.preferences.aggregate(&auth).await?))
}
