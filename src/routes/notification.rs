//! Notification route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::notifications::{
    invalidate_all_caches, invalidate_member_cache, list_notifications, mark_all_as_read,
    mark_as_read, reconcile_reminders, unread_count,
};
use crate::state::AppState;

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/members/:owner_id/notifications", get(list_notifications))
        .route(
            "/api/members/:owner_id/notifications/unread-count",
            get(unread_count),
        )
        .route(
            "/api/members/:owner_id/notifications/read-all",
            post(mark_all_as_read),
        )
        .route(
            "/api/members/:owner_id/notifications/cache",
            delete(invalidate_member_cache),
        )
        .route("/api/notifications/cache", delete(invalidate_all_caches))
        .route("/api/notifications/:id/read", post(mark_as_read))
        .route("/api/reminders/reconcile", post(reconcile_reminders))
}
