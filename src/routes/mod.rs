//! Route definitions for the notification API

mod notification;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::health::health_check;
use crate::state::AppState;

pub use notification::notification_routes;

/// Full application router with request tracing
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(notification_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
