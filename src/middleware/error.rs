//! Error response formatting.
//!
//! Every handler failure is serialized as the same JSON envelope with a
//! machine-readable code, a user-facing message and the request id.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, ErrorCode};

/// Standardized error body returned for all failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "server error"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "client error"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Standardized success envelope.
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_serializes_with_code_and_message() {
        let error = AppError::missing_field("studentName").with_request_id("req-1");
        let body = ErrorResponse::from_app_error(&error);
        assert_eq!(body.error, ErrorCode::ValidationError);
        assert_eq!(body.message, "studentName is required");
        assert_eq!(body.request_id.as_deref(), Some("req-1"));
        assert_eq!(body.retryable, Some(false));
    }

    #[test]
    fn storage_errors_are_retryable() {
        let error = AppError::storage_unavailable("both stores down");
        let body = ErrorResponse::from_app_error(&error);
        assert_eq!(body.error, ErrorCode::StorageUnavailable);
        assert_eq!(body.retryable, Some(true));
    }
}
