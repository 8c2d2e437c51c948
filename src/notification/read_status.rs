//! Read-status resolution across the transaction and global collections

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::NotifyError;
use crate::store::{Collection, Filter, RemoteStore, StoreError};

use super::model::{GlobalReadStatus, NotificationSource, TransactionNotification};

/// Where a mark-as-read call landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Transaction,
    /// `created` is true when a new read-status row was inserted
    Global { created: bool },
    NotFound,
}

impl ReadOutcome {
    pub fn is_hit(&self) -> bool {
        !matches!(self, ReadOutcome::NotFound)
    }
}

/// Marks notifications read in whichever collection holds them.
///
/// Transaction notifications are updated in place. Global notifications get a
/// per-member read-status row, inserted on first read. Marking an already-read
/// notification rewrites the flag and refreshes `updated_at`.
///
/// Cache invalidation is the caller's job.
pub struct ReadStatusResolver {
    store: Arc<dyn RemoteStore>,
}

impl ReadStatusResolver {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Boolean form of [`resolve`](Self::resolve): errors are logged and
    /// reported as `false`.
    pub async fn mark_as_read(
        &self,
        notification_id: &str,
        source: Option<NotificationSource>,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        match self.resolve(notification_id, source, owner_id, now).await {
            Ok(ReadOutcome::NotFound) => {
                tracing::debug!(notification_id = notification_id, "Notification not found in any collection");
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    notification_id = notification_id,
                    source = ?source,
                    owner_id = ?owner_id,
                    error = %e,
                    "Failed to mark notification as read"
                );
                false
            }
        }
    }

    /// Mark one notification read.
    ///
    /// With no `source`, the transaction collection is probed first and the
    /// global collection second; an id found in neither yields `NotFound`
    /// without any write.
    pub async fn resolve(
        &self,
        notification_id: &str,
        source: Option<NotificationSource>,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReadOutcome, NotifyError> {
        match source {
            Some(NotificationSource::Transaction) => {
                self.mark_transaction(notification_id, owner_id, now).await
            }
            Some(NotificationSource::Global) => {
                if !self.global_exists(notification_id).await? {
                    return Ok(ReadOutcome::NotFound);
                }
                self.mark_global(notification_id, owner_id, now).await
            }
            None => self.detect_and_mark(notification_id, owner_id, now).await,
        }
    }

    async fn detect_and_mark(
        &self,
        notification_id: &str,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReadOutcome, NotifyError> {
        if let Some(existing) = self.find_transaction(notification_id).await? {
            if let Some(owner_id) = owner_id {
                if existing.owner_id != owner_id {
                    return Err(NotifyError::Unauthorized(format!(
                        "notification {} belongs to another member",
                        notification_id
                    )));
                }
            }
            return self.mark_transaction(notification_id, owner_id, now).await;
        }

        if self.global_exists(notification_id).await? {
            return self.mark_global(notification_id, owner_id, now).await;
        }

        Ok(ReadOutcome::NotFound)
    }

    async fn mark_transaction(
        &self,
        notification_id: &str,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReadOutcome, NotifyError> {
        let mut filters = vec![Filter::eq("id", notification_id)];
        if let Some(owner_id) = owner_id {
            filters.push(Filter::eq("owner_id", owner_id));
        }

        let affected = self
            .store
            .update(
                Collection::TransactionNotification,
                &filters,
                json!({ "is_read": true, "updated_at": now }),
            )
            .await?;

        if affected > 0 {
            return Ok(ReadOutcome::Transaction);
        }

        // Distinguish a foreign row from a missing one
        if owner_id.is_some() && self.find_transaction(notification_id).await?.is_some() {
            return Err(NotifyError::Unauthorized(format!(
                "notification {} belongs to another member",
                notification_id
            )));
        }

        Ok(ReadOutcome::NotFound)
    }

    async fn mark_global(
        &self,
        notification_id: &str,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReadOutcome, NotifyError> {
        let owner_id = owner_id.ok_or_else(|| {
            NotifyError::Unauthorized(
                "a member id is required to mark a global notification".to_string(),
            )
        })?;

        if self.update_read_status(notification_id, owner_id, now).await? {
            return Ok(ReadOutcome::Global { created: false });
        }

        let status = GlobalReadStatus {
            id: Uuid::new_v4().to_string(),
            global_notification_id: notification_id.to_string(),
            owner_id: owner_id.to_string(),
            is_read: true,
            created_at: now,
            updated_at: now,
        };

        match self
            .store
            .insert(Collection::GlobalReadStatus, serde_json::to_value(&status)?)
            .await
        {
            Ok(_) => Ok(ReadOutcome::Global { created: true }),
            Err(StoreError::Conflict(_)) => {
                // A concurrent call inserted the pair first
                self.update_read_status(notification_id, owner_id, now)
                    .await?;
                Ok(ReadOutcome::Global { created: false })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flip an existing read-status row; false when the member has none yet
    async fn update_read_status(
        &self,
        notification_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, NotifyError> {
        let existing = self
            .store
            .query(
                Collection::GlobalReadStatus,
                &[
                    Filter::eq("global_notification_id", notification_id),
                    Filter::eq("owner_id", owner_id),
                ],
                None,
                Some(1),
            )
            .await?;

        let Some(row) = existing.into_iter().next() else {
            return Ok(false);
        };
        let status: GlobalReadStatus = serde_json::from_value(row)?;

        let affected = self
            .store
            .update(
                Collection::GlobalReadStatus,
                &[Filter::eq("id", status.id.as_str())],
                json!({ "is_read": true, "updated_at": now }),
            )
            .await?;

        Ok(affected > 0)
    }

    async fn find_transaction(
        &self,
        notification_id: &str,
    ) -> Result<Option<TransactionNotification>, NotifyError> {
        let rows = self
            .store
            .query(
                Collection::TransactionNotification,
                &[Filter::eq("id", notification_id)],
                None,
                Some(1),
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn global_exists(&self, notification_id: &str) -> Result<bool, NotifyError> {
        let rows = self
            .store
            .query(
                Collection::GlobalNotification,
                &[Filter::eq("id", notification_id)],
                None,
                Some(1),
            )
            .await?;
        Ok(!rows.is_empty())
    }
}
