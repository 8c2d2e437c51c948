//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::notification::NotificationService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub notification_service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(notification_service: Arc<NotificationService>) -> Self {
        Self {
            notification_service,
        }
    }
}

impl FromRef<AppState> for Arc<NotificationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.notification_service.clone()
    }
}
