use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{ActiveIdentity, NewChild};
use crate::middleware::{ApiResponse, ApiResult, AuthParent};
use crate::services::profile_service::ProfileSummary;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRequest {
    /// Child to act as; `null`, `""` or `"parent"` selects parent mode
    #[serde(default)]
    pub child_id: Option<String>,
}

/// GET /api/profile/active - the identity this request acts as
pub async fn active(Extension(identity): Extension<ActiveIdentity>) -> ApiResult<ActiveIdentity> {
    Ok(ApiResponse::success(identity))
}

/// GET /api/profile/list - parent plus every child, with the active one flagged
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
) -> ApiResult<Vec<ProfileSummary>> {
    let profiles = state.services.profiles.list(auth.parent_id).await?;
    Ok(ApiResponse::success(profiles))
}

/// POST /api/profile/switch - persist the active profile pointer
pub async fn switch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    body: Result<Json<SwitchRequest>, JsonRejection>,
) -> ApiResult<ActiveIdentity> {
    let Json(request) = body?;
    let identity = state
        .services
        .profiles
        .switch_active(auth.parent_id, request.child_id.as_deref())
        .await?;
    Ok(ApiResponse::success(identity))
}

/// POST /api/profile/children - add a child profile
pub async fn create_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    body: Result<Json<NewChild>, JsonRejection>,
) -> ApiResult<ProfileSummary> {
    let Json(request) = body?;
    let child = state.services.profiles.create_child(auth.parent_id, request).await?;
    Ok(ApiResponse::created(child))
}

/// DELETE /api/profile/children/:child_id
pub async fn delete_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Value> {
    let Path(child_id) = path?;
    state.services.profiles.delete_child(auth.parent_id, &child_id).await?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "Child profile deleted"
    })))
}
