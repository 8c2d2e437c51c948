//! Error types for the notification service
//!
//! `NotifyError` is the domain taxonomy shared by the reminder engine, the
//! read-status resolver and the feed. `ApiError` maps it onto HTTP responses.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Failures raised by the notification core
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Remote store error: {0}")]
    TransientRemote(String),

    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Connectivity probe timed out after {0:?}")]
    Timeout(Duration),
}

impl From<StoreError> for NotifyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Decode(e) => NotifyError::Decode(e.to_string()),
            other => NotifyError::TransientRemote(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Decode(err.to_string())
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream store error: {0}")]
    BadGateway(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::BadGateway(_) => "UPSTREAM_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            success: false,
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::NotFound(msg) => ApiError::NotFound(msg),
            NotifyError::Unauthorized(msg) => ApiError::Forbidden(msg),
            NotifyError::TransientRemote(msg) => ApiError::BadGateway(msg),
            NotifyError::Decode(msg) => ApiError::InternalError(msg),
            NotifyError::Timeout(after) => {
                ApiError::ServiceUnavailable(format!("store unreachable after {:?}", after))
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_error_mapping() {
        let api: ApiError = NotifyError::NotFound("n-1".to_string()).into();
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);

        let api: ApiError = NotifyError::Unauthorized("owner mismatch".to_string()).into();
        assert_eq!(api.status_code(), StatusCode::FORBIDDEN);

        let api: ApiError = NotifyError::TransientRemote("reset".to_string()).into();
        assert_eq!(api.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(api.error_code(), "UPSTREAM_ERROR");

        let api: ApiError = NotifyError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(api.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_conflict_is_transient() {
        let err: NotifyError = StoreError::Conflict("duplicate".to_string()).into();
        assert!(matches!(err, NotifyError::TransientRemote(_)));
    }
}
