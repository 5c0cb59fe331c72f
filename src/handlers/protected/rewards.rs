use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension,
};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ActiveIdentity, Badge, CoinTransaction, IdentityKind, RedeemedBadge};
use crate::middleware::{ApiResponse, ApiResult, AuthParent};
use crate::services::profile_service::Leaderboard;
use crate::services::{AchievementSummary, Redemption};
use crate::types::{Page, Pagination};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub balance: i64,
    pub display_name: String,
    pub kind: IdentityKind,
}

/// GET /api/rewards/balance
pub async fn balance(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
) -> ApiResult<Balance> {
    let totals = state.services.ledger.totals(&identity.owner).await?;
    Ok(ApiResponse::success(Balance {
        balance: totals.balance,
        display_name: identity.display_name,
        kind: identity.kind,
    }))
}

/// GET /api/rewards/transactions?page&pageSize - newest first
pub async fn transactions(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
    pagination: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Page<CoinTransaction>> {
    let Query(pagination) = pagination?;
    let page = state
        .services
        .ledger
        .transactions(&identity.owner, pagination)
        .await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/rewards/achievements - catalog with unlock state and streak progress
pub async fn achievements(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
) -> ApiResult<AchievementSummary> {
    let summary = state.services.achievements.summary(&identity.owner).await?;
    Ok(ApiResponse::success(summary))
}

/// GET /api/rewards/badges - active catalog, cheapest first
pub async fn badges(State(state): State<AppState>) -> ApiResult<Vec<Badge>> {
    Ok(ApiResponse::success(state.services.badges.catalog().await?))
}

/// GET /api/rewards/badges/mine
pub async fn my_badges(
    State(state): State<AppState>,
    Extension(identity): Extension<ActiveIdentity>,
) -> ApiResult<Vec<RedeemedBadge>> {
    let owned = state.services.badges.owned(&identity.owner).await?;
    Ok(ApiResponse::success(owned))
}

/// POST /api/rewards/badges/:id/redeem
pub async fn redeem(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    Extension(identity): Extension<ActiveIdentity>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Redemption> {
    let Path(badge_id) = path?;
    let redemption = state
        .services
        .badges
        .redeem(&identity.owner, badge_id, auth.parent_id)
        .await?;
    Ok(ApiResponse::success(redemption))
}

/// GET /api/rewards/leaderboard - household ranking by coins
pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthParent>,
    Extension(identity): Extension<ActiveIdentity>,
) -> ApiResult<Leaderboard> {
    let board = state
        .services
        .profiles
        .leaderboard(auth.parent_id, &identity.owner)
        .await?;
    Ok(ApiResponse::success(board))
}
