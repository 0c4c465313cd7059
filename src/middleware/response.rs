use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::pagination::PageInfo;

/// Success envelope: `{success: true, message?, data, pagination?}`.
/// Failures go through [`crate::error::ApiError`] instead.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: Option<String>,
    pub pagination: Option<PageInfo>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
            pagination: None,
            status_code: StatusCode::OK,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
            pagination: None,
            status_code: StatusCode::OK,
        }
    }

    /// 201 Created with an action-specific message.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
            pagination: None,
            status_code: StatusCode::CREATED,
        }
    }

    /// 200 OK list response with a pagination block.
    pub fn paginated(data: T, pagination: PageInfo) -> Self {
        Self {
            data,
            message: None,
            pagination: Some(pagination),
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(cause = %e, "failed to serialize response data");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "message": "Server Error"
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = json!({
            "success": true,
            "data": data,
        });
        if let Some(message) = self.message {
            envelope["message"] = json!(message);
        }
        if let Some(pagination) = self.pagination {
            envelope["pagination"] = json!(pagination);
        }

        (self.status_code, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
