use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::clock::Clock;
use crate::config::RewardsConfig;
use crate::database::models::{
    HydrationDetails, MedicationIntakeDetails, MoodDetails, PainDetails,
};
use crate::database::SharedStore;
use crate::handlers::{protected, public};
use crate::middleware::{active_profile_middleware, jwt_auth_middleware};
use crate::services::Services;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub services: Services,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        rewards: &RewardsConfig,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            services: Services::new(store.clone(), clock, rewards),
            store,
            jwt: Arc::new(jwt),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(profile_routes())
        .merge(log_routes())
        .merge(reward_routes())
        // Layers run bottom-up: the JWT check wraps profile resolution
        .layer(from_fn_with_state(state.clone(), active_profile_middleware))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn profile_routes() -> Router<AppState> {
    use protected::profile;

    Router::new()
        .route("/api/profile/active", get(profile::active))
        .route("/api/profile/list", get(profile::list))
        .route("/api/profile/switch", post(profile::switch))
        .route("/api/profile/children", post(profile::create_child))
        .route("/api/profile/children/:child_id", delete(profile::delete_child))
}

fn log_routes() -> Router<AppState> {
    Router::new()
        .nest("/api/pain", category_routes::<PainDetails>())
        .nest("/api/mood", category_routes::<MoodDetails>())
        .nest("/api/hydration", category_routes::<HydrationDetails>())
        .nest("/api/medications/intakes", category_routes::<MedicationIntakeDetails>())
        .route(
            "/api/medications/schedules",
            get(protected::medications::list).post(protected::medications::create),
        )
        .route(
            "/api/medications/schedules/:id",
            axum::routing::put(protected::medications::update)
                .delete(protected::medications::remove),
        )
}

/// Create/list on the collection, update/delete on `/:id`, for one category.
fn category_routes<T>() -> Router<AppState>
where
    T: crate::database::models::CategoryInput + Sync,
{
    use protected::logs;

    Router::new()
        .route("/", get(logs::list::<T>).post(logs::create::<T>))
        .route("/:id", axum::routing::put(logs::update::<T>).delete(logs::remove::<T>))
}

fn reward_routes() -> Router<AppState> {
    use protected::rewards;

    Router::new()
        .route("/api/rewards/balance", get(rewards::balance))
        .route("/api/rewards/transactions", get(rewards::transactions))
        .route("/api/rewards/achievements", get(rewards::achievements))
        .route("/api/rewards/badges", get(rewards::badges))
        .route("/api/rewards/badges/mine", get(rewards::my_badges))
        .route("/api/rewards/badges/:id/redeem", post(rewards::redeem))
        .route("/api/rewards/leaderboard", get(rewards::leaderboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CategoryFilter, CriteriaKind, NewParent, OwnerRef};
    use crate::services::catalog;
    use crate::testing::TestContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[tokio::test]
    async fn reward_outage_still_creates_the_log() {
        let (ctx, faults) = TestContext::with_faults();
        catalog::seed_if_empty(&ctx.store).await.unwrap();
        let parent = ctx
            .store
            .create_parent(
                &NewParent {
                    first_name: "Ada".into(),
                    last_name: "Eze".into(),
                    email: "ada@example.com".into(),
                    avatar_url: None,
                },
                ctx.clock.now(),
            )
            .await
            .unwrap();
        let jwt = JwtKeys::new("router-test-secret", 1);
        let token = jwt.generate_jwt(parent.id).unwrap();
        let state = AppState {
            store: ctx.store.clone(),
            services: ctx.services.clone(),
            jwt: Arc::new(jwt),
        };
        let app = router(state);

        faults.fail_credits(true);
        faults.fail_grants(true);
        let request = Request::post("/api/pain")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "occurredAt": ctx.clock.now(),
                    "location": "back",
                    "painType": "dull",
                    "intensity": 4
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(body["coinsEarned"], 0);
        assert_eq!(body["alreadyAwardedToday"], false);
        assert_eq!(body["achievements"], json!([]));
        assert_eq!(body["message"], "Pain log saved");

        let owner = OwnerRef::parent(parent.id);
        assert_eq!(
            ctx.store
                .count_logs(&owner, CategoryFilter::Any, None)
                .await
                .unwrap(),
            1
        );
        assert_eq!(ctx.balance(&owner).await, 0);
        // Nothing was granted, so the seeded first-log achievement is still pending
        let pending = ctx.store.pending_achievements(&owner).await.unwrap();
        assert!(pending
            .iter()
            .any(|a| a.criteria_kind == CriteriaKind::TotalLogs && a.criteria_value == 1));
    }
}
