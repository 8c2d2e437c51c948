//! Notification API handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    ApiResponse, ListNotificationsQuery, MarkAllReadResponse, MarkReadRequest, MarkReadResponse,
    ReconcileRequest, UnreadCountResponse,
};
use crate::notification::{Notification, NotificationService, OwnerScope, ReconcileReport};

/// Decode an optional JSON body. An empty body yields the default request;
/// anything else must parse.
fn optional_json_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

/// GET /api/members/:owner_id/notifications - Member feed, newest first
pub async fn list_notifications(
    State(service): State<Arc<NotificationService>>,
    Path(owner_id): Path<String>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Notification>>>> {
    query.validate()?;

    let notifications = service
        .get_notifications(&owner_id, query.limit, query.refresh)
        .await?;

    Ok(Json(ApiResponse::ok(notifications)))
}

/// GET /api/members/:owner_id/notifications/unread-count
pub async fn unread_count(
    State(service): State<Arc<NotificationService>>,
    Path(owner_id): Path<String>,
) -> ApiResult<Json<ApiResponse<UnreadCountResponse>>> {
    let unread = service.unread_count(&owner_id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { unread })))
}

/// POST /api/members/:owner_id/notifications/read-all
pub async fn mark_all_as_read(
    State(service): State<Arc<NotificationService>>,
    Path(owner_id): Path<String>,
) -> ApiResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let marked = service.mark_all_as_read(&owner_id).await?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { marked })))
}

/// DELETE /api/members/:owner_id/notifications/cache
pub async fn invalidate_member_cache(
    State(service): State<Arc<NotificationService>>,
    Path(owner_id): Path<String>,
) -> Json<ApiResponse<()>> {
    service.invalidate_cache(Some(&owner_id)).await;
    Json(ApiResponse::ok(()))
}

/// DELETE /api/notifications/cache - Clear every member's cached feed
pub async fn invalidate_all_caches(
    State(service): State<Arc<NotificationService>>,
) -> Json<ApiResponse<()>> {
    service.invalidate_cache(None).await;
    Json(ApiResponse::ok(()))
}

/// POST /api/notifications/:id/read
///
/// `marked` is false both when the id is unknown and when the write failed.
pub async fn mark_as_read(
    State(service): State<Arc<NotificationService>>,
    Path(notification_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse<MarkReadResponse>>> {
    let request: MarkReadRequest = optional_json_body(&body)?;

    let marked = service
        .mark_as_read(
            &notification_id,
            request.source,
            request.owner_id.as_deref(),
        )
        .await;

    Ok(Json(ApiResponse::ok(MarkReadResponse { marked })))
}

/// POST /api/reminders/reconcile - Raise missing installment reminders now
pub async fn reconcile_reminders(
    State(service): State<Arc<NotificationService>>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse<ReconcileReport>>> {
    let request: ReconcileRequest = optional_json_body(&body)?;
    request.validate()?;

    let scope = match request.owner_id {
        Some(owner_id) => OwnerScope::One(owner_id),
        None => OwnerScope::All,
    };
    let report = service.reconcile_loans(scope, Utc::now()).await;

    Ok(Json(ApiResponse::ok(report)))
}
