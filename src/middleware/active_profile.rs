use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthParent;
use crate::app::AppState;
use crate::error::ApiError;

/// Resolves the active identity for the authenticated parent and injects it
/// as `ActiveIdentity`. Runs after `jwt_auth_middleware`.
pub async fn active_profile_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthParent>()
        .copied()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before profile resolution"))?;

    let identity = state.services.profiles.resolve(auth.parent_id).await.map_err(|e| {
        tracing::warn!("Profile resolution failed for parent {}: {}", auth.parent_id, e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
