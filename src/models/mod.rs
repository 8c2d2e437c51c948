//! Request and response types for the HTTP API

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::notification::NotificationSource;

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Query for the member notification feed
#[derive(Debug, Deserialize, Validate)]
pub struct ListNotificationsQuery {
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<usize>,

    #[serde(default)]
    pub refresh: bool,
}

/// Body of a mark-as-read call; both fields may be omitted
#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    pub source: Option<NotificationSource>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: usize,
}

/// Body of a reconcile call; no member id means every member
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReconcileRequest {
    #[validate(length(min = 1))]
    pub owner_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_range_is_validated() {
        let ok = ListNotificationsQuery {
            limit: Some(50),
            refresh: false,
        };
        assert!(ok.validate().is_ok());

        let none = ListNotificationsQuery {
            limit: None,
            refresh: true,
        };
        assert!(none.validate().is_ok());

        let zero = ListNotificationsQuery {
            limit: Some(0),
            refresh: false,
        };
        assert!(zero.validate().is_err());

        let huge = ListNotificationsQuery {
            limit: Some(500),
            refresh: false,
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_mark_read_body_fields_are_optional() {
        let empty: MarkReadRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.source.is_none());
        assert!(empty.owner_id.is_none());

        let full: MarkReadRequest =
            serde_json::from_str(r#"{"source":"global","owner_id":"user-123"}"#).unwrap();
        assert_eq!(full.source, Some(NotificationSource::Global));
        assert_eq!(full.owner_id.as_deref(), Some("user-123"));
    }

    #[test]
    fn test_reconcile_rejects_blank_owner() {
        let blank = ReconcileRequest {
            owner_id: Some(String::new()),
        };
        assert!(blank.validate().is_err());
        assert!(ReconcileRequest::default().validate().is_ok());
    }
}
