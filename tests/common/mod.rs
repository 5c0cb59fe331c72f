#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use carelog_api::app::{router, AppState};
use carelog_api::auth::JwtKeys;
use carelog_api::clock::{Clock, ManualClock};
use carelog_api::config::RewardsConfig;
use carelog_api::database::models::{
    Achievement, Badge, CategoryFilter, CriteriaKind, NewParent, ParentAccount,
};
use carelog_api::database::{MemoryStore, SharedStore};

pub const TEST_SECRET: &str = "carelog-test-secret";

/// The router over an in-memory store, driven in-process
pub struct TestApp {
    pub router: Router,
    pub store: SharedStore,
    pub clock: ManualClock,
    pub jwt: JwtKeys,
}

/// An authenticated parent account
pub struct TestParent {
    pub account: ParentAccount,
    pub token: String,
}

impl TestApp {
    /// Empty catalogs, clock at 2024-06-03 09:00 UTC
    pub fn new() -> Self {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let state = AppState::new(
            store.clone(),
            shared_clock,
            &RewardsConfig::default(),
            JwtKeys::new(TEST_SECRET, 24),
        );

        Self {
            router: router(state),
            store,
            clock,
            jwt: JwtKeys::new(TEST_SECRET, 24),
        }
    }

    /// Default achievement and badge catalogs
    pub async fn seeded() -> Self {
        let app = Self::new();
        carelog_api::services::catalog::seed_if_empty(&app.store)
            .await
            .expect("seed catalogs");
        app
    }

    pub async fn create_parent(&self, first_name: &str) -> TestParent {
        let account = self
            .store
            .create_parent(
                &NewParent {
                    first_name: first_name.to_string(),
                    last_name: "Family".to_string(),
                    email: format!("{}-{}@example.com", first_name.to_lowercase(), Uuid::new_v4()),
                    avatar_url: None,
                },
                self.clock.now(),
            )
            .await
            .expect("create parent");
        let token = self.jwt.generate_jwt(account.id).expect("mint token");
        TestParent { account, token }
    }

    pub async fn add_achievement(
        &self,
        title: &str,
        criteria_kind: CriteriaKind,
        criteria_value: i64,
        category_filter: CategoryFilter,
        reward_coins: i64,
    ) -> Achievement {
        let achievement = Achievement {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{} test achievement", title),
            icon: "🏅".to_string(),
            criteria_kind,
            criteria_value,
            category_filter,
            reward_coins,
            active: true,
        };
        self.store
            .insert_achievement(&achievement)
            .await
            .expect("insert achievement");
        achievement
    }

    pub async fn add_badge(&self, title: &str, coin_cost: i64, active: bool) -> Badge {
        let badge = Badge {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{} test badge", title),
            icon: "⭐".to_string(),
            coin_cost,
            active,
        };
        self.store.insert_badge(&badge).await.expect("insert badge");
        badge
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Create a child through the API and return its id
    pub async fn create_child(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/profile/children", token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create child: {}", body);
        body["id"].as_str().expect("child id").to_string()
    }

    pub async fn switch_to(&self, token: &str, child_id: Option<&str>) -> Value {
        let (status, body) = self
            .post("/api/profile/switch", token, serde_json::json!({ "childId": child_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "switch: {}", body);
        body
    }

    pub async fn balance(&self, token: &str) -> i64 {
        let (status, body) = self.get("/api/rewards/balance", token).await;
        assert_eq!(status, StatusCode::OK, "balance: {}", body);
        body["balance"].as_i64().expect("balance")
    }

    /// Create a medication schedule for the active identity and return its id
    pub async fn create_schedule(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/medications/schedules", token, schedule_body(name))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create schedule: {}", body);
        body["id"].as_str().expect("schedule id").to_string()
    }

    /// Set `occurredAt` to the current test clock time
    pub fn stamped(&self, mut body: Value) -> Value {
        body["occurredAt"] = Value::String(self.clock.now().to_rfc3339());
        body
    }

    pub fn hydration_body(&self) -> Value {
        self.stamped(serde_json::json!({ "amountOz": 8, "kind": "glass" }))
    }

    pub fn pain_body(&self, intensity: u8) -> Value {
        self.stamped(serde_json::json!({
            "location": "knee",
            "painType": "aching",
            "intensity": intensity
        }))
    }

    pub fn mood_body(&self) -> Value {
        self.stamped(serde_json::json!({ "emoji": "🙂", "intensity": 6 }))
    }

    pub fn intake_body(&self, schedule_id: &str, label: &str, status: &str) -> Value {
        self.stamped(serde_json::json!({
            "scheduleId": schedule_id,
            "label": label,
            "status": status
        }))
    }
}

pub fn schedule_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "dose": "5ml",
        "type": "Liquid",
        "times": { "morning": "08:00", "evening": "19:00" },
        "fromDate": "2024-06-01",
        "daysOfWeek": [1, 2, 3, 4, 5, 6, 7]
    })
}
