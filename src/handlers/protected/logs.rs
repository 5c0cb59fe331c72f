//! Per-category activity log handlers.
//!
//! Every handler is generic over the category payload, so one set of functions
//! serves `/api/pain`, `/api/mood`, `/api/hydration` and `/api/medications/intakes`.
//! All of them act on the active identity only.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ActiveIdentity, CategoryInput, LogPayload, LogQuery, LogRecord};
use crate::middleware::{ApiResponse, ApiResult, AuthParent};
use crate::services::LogOutcome;
use crate::types::{Page, Pagination};

/// `?from&to&page&pageSize`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListParams {
    fn split(self) -> (LogQuery, Pagination) {
        let defaults = Pagination::default();
        (
            LogQuery {
                from: self.from,
                to: self.to,
            },
            Pagination {
                page: self.page.unwrap_or(defaults.page),
                page_size: self.page_size.unwrap_or(defaults.page_size),
            },
        )
    }
}

/// POST /api/<category> - record a log for the active identity
pub async fn create<T: CategoryInput>(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    Extension(identity): Extension<ActiveIdentity>,
    body: Result<Json<LogPayload<T>>, JsonRejection>,
) -> ApiResult<LogOutcome> {
    let Json(payload) = body?;
    let outcome = state
        .services
        .activity
        .create(&identity.owner, auth.parent_id, payload)
        .await?;
    Ok(ApiResponse::created(outcome))
}

/// GET /api/<category> - newest first
pub async fn list<T: CategoryInput>(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<LogRecord>> {
    let Query(params) = params?;
    let (query, pagination) = params.split();
    let page = state
        .services
        .activity
        .list(&identity.owner, T::CATEGORY, &query, pagination)
        .await?;
    Ok(ApiResponse::success(page))
}

/// PUT /api/<category>/:id
pub async fn update<T: CategoryInput>(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<LogPayload<T>>, JsonRejection>,
) -> ApiResult<LogRecord> {
    let Path(id) = path?;
    let Json(payload) = body?;
    let log = state
        .services
        .activity
        .update(&identity.owner, id, payload)
        .await?;
    Ok(ApiResponse::success(log))
}

/// DELETE /api/<category>/:id
pub async fn remove<T: CategoryInput>(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    state
        .services
        .activity
        .delete(&identity.owner, T::CATEGORY, id)
        .await?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": format!("{} log deleted", T::CATEGORY)
    })))
}
