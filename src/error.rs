// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::StoreError;
use crate::services::{ActivityError, MedicationError, ProfileError};

/// HTTP API error with a stable code and a client-safe message
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidChild(String),
    InsufficientBalance {
        balance: i64,
        requested: i64,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    AlreadyOwned(String),

    // 500 Internal Server Error
    ServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidChild(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyOwned(_) => StatusCode::CONFLICT,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::InvalidChild(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::AlreadyOwned(msg)
            | ApiError::ServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::InsufficientBalance { balance, requested } => format!(
                "Not enough coins: balance is {}, {} required",
                balance, requested
            ),
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidChild(_) => "INVALID_CHILD",
            ApiError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::AlreadyOwned(_) => "ALREADY_OWNED",
            ApiError::ServerError(_) => "SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "code": self.error_code(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError {
                field_errors: Some(field_errors),
                ..
            } => {
                body["field_errors"] = json!(field_errors);
            }
            ApiError::InsufficientBalance { balance, requested } => {
                body["balance"] = json!(balance);
                body["required"] = json!(requested);
            }
            _ => {}
        }

        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_child(child_id: &str) -> Self {
        ApiError::InvalidChild(format!("No child profile with id '{}'", child_id))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn already_owned(message: impl Into<String>) -> Self {
        ApiError::AlreadyOwned(message.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        ApiError::ServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            StoreError::InsufficientBalance { balance, requested } => {
                ApiError::InsufficientBalance { balance, requested }
            }
            StoreError::InvalidAmount(amount) => {
                ApiError::bad_request(format!("Amount must be positive, got {}", amount))
            }
            StoreError::Conflict(msg) => ApiError::already_owned(msg),
            StoreError::Corrupt(msg) => {
                tracing::error!("Corrupt row in store: {}", msg);
                ApiError::server_error("An error occurred while processing your request")
            }
            StoreError::Sqlx(sqlx::Error::PoolTimedOut) => {
                tracing::error!("Database pool timed out");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::server_error("Database error occurred")
            }
            StoreError::Serialization(e) => {
                tracing::error!("JSON serialization error: {}", e);
                ApiError::server_error("Failed to format response")
            }
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::ParentNotFound(_) => ApiError::not_found("Parent account not found"),
            ProfileError::InvalidChild(child_id) => ApiError::invalid_child(&child_id),
            ProfileError::ChildNotFound(child_id) => {
                ApiError::not_found(format!("Child profile '{}' not found", child_id))
            }
            ProfileError::Validation(msg) => ApiError::validation_error(msg, None),
            ProfileError::Store(e) => e.into(),
        }
    }
}

impl From<ActivityError> for ApiError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::Validation {
                category,
                field_errors,
            } => ApiError::validation_error(format!("Invalid {} log", category), Some(field_errors)),
            ActivityError::NotFound { category, .. } => {
                ApiError::not_found(format!("{} log not found", category))
            }
            ActivityError::ScheduleNotFound(_) => {
                ApiError::not_found("Medication schedule not found")
            }
            ActivityError::Store(e) => e.into(),
        }
    }
}

impl From<MedicationError> for ApiError {
    fn from(err: MedicationError) -> Self {
        match err {
            MedicationError::Validation(field_errors) => {
                ApiError::validation_error("Invalid medication schedule", Some(field_errors))
            }
            MedicationError::NotFound(_) => ApiError::not_found("Medication schedule not found"),
            MedicationError::Store(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text(), None)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
