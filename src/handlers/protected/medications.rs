//! Medication schedules of the active identity.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ActiveIdentity, MedicationSchedule, ScheduleDetails};
use crate::middleware::{ApiResponse, ApiResult, AuthParent};

/// GET /api/medications/schedules
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
) -> ApiResult<Vec<MedicationSchedule>> {
    let schedules = state.services.medications.list(&identity.owner).await?;
    Ok(ApiResponse::success(schedules))
}

/// POST /api/medications/schedules
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    Extension(identity): Extension<ActiveIdentity>,
    body: Result<Json<ScheduleDetails>, JsonRejection>,
) -> ApiResult<MedicationSchedule> {
    let Json(details) = body?;
    let schedule = state
        .services
        .medications
        .create(&identity.owner, auth.parent_id, details)
        .await?;
    Ok(ApiResponse::created(schedule))
}

/// PUT /api/medications/schedules/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ScheduleDetails>, JsonRejection>,
) -> ApiResult<MedicationSchedule> {
    let Path(id) = path?;
    let Json(details) = body?;
    let schedule = state
        .services
        .medications
        .update(&identity.owner, id, details)
        .await?;
    Ok(ApiResponse::success(schedule))
}

/// DELETE /api/medications/schedules/:id
pub async fn remove(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    state
        .services
        .medications
        .delete(&identity.owner, id)
        .await?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "Medication schedule deleted"
    })))
}
