// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Route Prefix: none (/, /health)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service banner with the endpoint map
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "CareLog API",
        "version": version,
        "description": "Family health tracking with parent/child profiles and coin rewards",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "profile": "/api/profile/active, /api/profile/list, /api/profile/switch, /api/profile/children[/:childId] (protected)",
            "logs": "/api/pain, /api/mood, /api/hydration, /api/medications/intakes [/:id] (protected)",
            "rewards": "/api/rewards/balance, /transactions, /achievements, /badges, /badges/mine, /badges/:id/redeem, /leaderboard (protected)",
        }
    }))
}

/// GET /health - store liveness
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
