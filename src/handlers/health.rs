//! Health check handler

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::HealthResponse;
use crate::notification::NotificationService;

/// GET /health - Store connectivity probe
pub async fn health_check(
    State(service): State<Arc<NotificationService>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, store) = match service.check_connectivity().await {
        Ok(()) => (StatusCode::OK, "connected".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("error: {}", e)),
    };

    let label = if status == StatusCode::OK {
        "healthy"
    } else {
        "unhealthy"
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
