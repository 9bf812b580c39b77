use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::AppUser;
use shared_models::error::AppError;

use crate::models::{Therapist, TherapistError, TherapistProfileRequest, TherapistSearchQuery};
use crate::router::TherapistState;

impl From<TherapistError> for AppError {
    fn from(err: TherapistError) -> Self {
        match err {
            TherapistError::NotFound => AppError::NotFound(err.to_string()),
            TherapistError::Unauthorized => AppError::Forbidden(err.to_string()),
            TherapistError::ValidationError(msg) => AppError::ValidationError(msg),
            TherapistError::InvalidSeed(msg) => AppError::Internal(msg),
        }
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_therapists(
    State(state): State<TherapistState>,
    Query(query): Query<TherapistSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let therapists = state.catalog.search(&query).await;

    Ok(Json(json!({
        "therapists": therapists,
        "total": therapists.len()
    })))
}

#[axum::debug_handler]
pub async fn featured_therapists(
    State(state): State<TherapistState>,
) -> Result<Json<Vec<Therapist>>, AppError> {
    Ok(Json(state.catalog.featured().await))
}

#[axum::debug_handler]
pub async fn get_therapist(
    State(state): State<TherapistState>,
    Path(therapist_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let therapist = state.catalog.get(therapist_id).await?;
    let services = therapist.bookable_services();

    Ok(Json(json!({
        "therapist": therapist,
        "services": services
    })))
}

// ==============================================================================
// PROFILE MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn create_therapist(
    State(state): State<TherapistState>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<TherapistProfileRequest>,
) -> Result<(StatusCode, Json<Therapist>), AppError> {
    debug!("Therapist registration by user {}", user.id);

    state.catalog.ensure_can_register(&user)?;
    let therapist = state.catalog.create(request).await?;

    Ok((StatusCode::CREATED, Json(therapist)))
}

#[axum::debug_handler]
pub async fn update_therapist(
    State(state): State<TherapistState>,
    Path(therapist_id): Path<i64>,
    Extension(user): Extension<AppUser>,
    Json(request): Json<TherapistProfileRequest>,
) -> Result<Json<Therapist>, AppError> {
    state.catalog.ensure_can_manage(&user, therapist_id)?;
    let therapist = state.catalog.update(therapist_id, request).await?;

    Ok(Json(therapist))
}

#[axum::debug_handler]
pub async fn delete_therapist(
    State(state): State<TherapistState>,
    Path(therapist_id): Path<i64>,
    Extension(user): Extension<AppUser>,
) -> Result<StatusCode, AppError> {
    if !user.is_admin() {
        return Err(TherapistError::Unauthorized.into());
    }

    state.catalog.delete(therapist_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
