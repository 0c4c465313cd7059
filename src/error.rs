// HTTP API error types: the single normalization point for every failure
// shape the handlers can produce.
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config;
use crate::store::StoreError;

/// One violated constraint reported by the schema validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Closed error taxonomy; every variant maps to exactly one status code and
/// envelope. Matched exhaustively - no name or code sniffing downstream.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation(Vec<FieldError>),
    /// Unique-constraint violation surfaced by the store.
    Conflict,
    /// Foreign-key violation surfaced by the store.
    InvalidReference,
    /// Malformed identifier in a path or payload.
    InvalidId,
    /// Store-level row-not-found (e.g. an update racing a delete).
    RecordNotFound,
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found (resource name, e.g. "Post")
    NotFound(String),

    // 500 Internal Server Error; detail exposed only outside production
    Internal { detail: Option<String> },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict
            | ApiError::InvalidReference
            | ApiError::InvalidId
            | ApiError::RecordNotFound
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message.
    pub fn message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Validation failed".to_string(),
            ApiError::Conflict => "Duplicate field value entered".to_string(),
            ApiError::InvalidReference => "Invalid input data".to_string(),
            ApiError::InvalidId => "Invalid ID value".to_string(),
            ApiError::RecordNotFound => "Record not found".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::NotFound(resource) => format!("{} not found", resource),
            ApiError::Internal { .. } => "Server Error".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    /// "Not authorized to <action> this <resource>"
    pub fn forbidden_action(action: &str, resource: &str) -> Self {
        ApiError::Forbidden(format!("Not authorized to {} this {}", action, resource))
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Unclassified failure. The cause is logged here; clients only ever see
    /// "Server Error" (plus detail in development mode).
    pub fn internal(err: impl std::fmt::Display) -> Self {
        let detail = err.to_string();
        tracing::error!(detail = %detail, "unclassified failure");
        ApiError::Internal { detail: Some(detail) }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.message(),
        });
        match self {
            ApiError::Validation(errors) => {
                body["errors"] = json!(errors);
            }
            ApiError::Internal { detail } => {
                if config::config().security.expose_error_detail {
                    if let Some(detail) = detail {
                        body["detail"] = json!(detail);
                    }
                }
            }
            _ => {}
        }
        body
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ApiError::Conflict,
            StoreError::ForeignKey => ApiError::InvalidReference,
            StoreError::NotFound => ApiError::RecordNotFound,
            StoreError::Database(e) => ApiError::internal(e),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
