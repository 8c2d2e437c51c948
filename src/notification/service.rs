//! Notification service facade
//!
//! Owns the reminder engine, the read-status resolver, the feed strategy and
//! the per-member fetch cache, and keeps the cache consistent with the writes
//! made through it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::NotificationSettings;
use crate::db::check_connectivity;
use crate::error::NotifyError;
use crate::store::{Collection, Filter, RemoteStore};

use super::cache::FetchCache;
use super::feed::{default_feed, FeedSource};
use super::model::{Notification, NotificationSource};
use super::read_status::{ReadOutcome, ReadStatusResolver};
use super::reminder::{OwnerScope, ReconcileReport, ReminderEngine};

pub struct NotificationService {
    store: Arc<dyn RemoteStore>,
    reminders: ReminderEngine,
    resolver: ReadStatusResolver,
    feed: Box<dyn FeedSource>,
    cache: FetchCache<Notification>,
    default_limit: usize,
    connectivity_timeout: Duration,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RemoteStore>, settings: &NotificationSettings) -> Self {
        let feed = Box::new(default_feed(store.clone()));
        Self::with_feed(store, settings, feed)
    }

    /// Build with a custom feed strategy
    pub fn with_feed(
        store: Arc<dyn RemoteStore>,
        settings: &NotificationSettings,
        feed: Box<dyn FeedSource>,
    ) -> Self {
        Self {
            reminders: ReminderEngine::new(store.clone(), settings),
            resolver: ReadStatusResolver::new(store.clone()),
            store,
            feed,
            cache: FetchCache::new(settings.cache_ttl),
            default_limit: settings.default_limit.max(1),
            connectivity_timeout: settings.connectivity_timeout,
        }
    }

    /// Raise any missing installment reminders, then drop the affected cache entries
    pub async fn reconcile_loans(&self, scope: OwnerScope, now: DateTime<Utc>) -> ReconcileReport {
        let report = self.reminders.reconcile_loans(scope.clone(), now).await;

        if report.reminders_created > 0 {
            match &scope {
                OwnerScope::One(owner_id) => self.cache.invalidate(Some(owner_id)).await,
                OwnerScope::All => self.cache.invalidate(None).await,
            }
        }

        tracing::info!(
            scope = ?scope,
            loans_checked = report.loans_checked,
            reminders_created = report.reminders_created,
            loans_failed = report.loans_failed,
            "Reminder reconciliation finished"
        );
        report
    }

    /// Mark one notification read. Returns `false` when it was not found or
    /// the write failed.
    pub async fn mark_as_read(
        &self,
        notification_id: &str,
        source: Option<NotificationSource>,
        owner_id: Option<&str>,
    ) -> bool {
        let marked = self
            .resolver
            .mark_as_read(notification_id, source, owner_id, Utc::now())
            .await;

        if marked {
            self.cache.invalidate(owner_id).await;
        }
        marked
    }

    /// Like [`mark_as_read`](Self::mark_as_read) but keeps the failure reason
    pub async fn resolve_read(
        &self,
        notification_id: &str,
        source: Option<NotificationSource>,
        owner_id: Option<&str>,
    ) -> Result<ReadOutcome, NotifyError> {
        let outcome = self
            .resolver
            .resolve(notification_id, source, owner_id, Utc::now())
            .await?;

        if outcome.is_hit() {
            self.cache.invalidate(owner_id).await;
        }
        Ok(outcome)
    }

    /// A member's feed, newest first. Served from cache while fresh.
    pub async fn get_notifications(
        &self,
        owner_id: &str,
        limit: Option<usize>,
        force_refresh: bool,
    ) -> Result<Vec<Notification>, NotifyError> {
        let limit = limit.unwrap_or(self.default_limit).max(1);
        self.cache
            .fetch(owner_id, limit, force_refresh, || self.feed.load(owner_id, limit))
            .await
    }

    /// Drop one member's cached feed, or every feed when `owner_id` is `None`
    pub async fn invalidate_cache(&self, owner_id: Option<&str>) {
        self.cache.invalidate(owner_id).await;
        tracing::debug!(owner_id = ?owner_id, "Notification cache invalidated");
    }

    pub async fn unread_count(&self, owner_id: &str) -> Result<usize, NotifyError> {
        let feed = self.get_notifications(owner_id, None, false).await?;
        Ok(feed.iter().filter(|n| !n.is_read()).count())
    }

    /// Mark every unread item of a member's feed read; returns how many were marked
    pub async fn mark_all_as_read(&self, owner_id: &str) -> Result<usize, NotifyError> {
        let now = Utc::now();
        let feed = self.get_notifications(owner_id, None, true).await?;

        let transactions = self
            .store
            .update(
                Collection::TransactionNotification,
                &[Filter::eq("owner_id", owner_id), Filter::eq("is_read", false)],
                json!({ "is_read": true, "updated_at": now }),
            )
            .await?;

        let mut marked = transactions as usize;
        for notification in feed
            .iter()
            .filter(|n| n.source() == NotificationSource::Global && !n.is_read())
        {
            let outcome = self
                .resolver
                .resolve(
                    notification.id(),
                    Some(NotificationSource::Global),
                    Some(owner_id),
                    now,
                )
                .await?;
            if outcome.is_hit() {
                marked += 1;
            }
        }

        self.cache.invalidate(Some(owner_id)).await;
        tracing::info!(owner_id = owner_id, marked, "Marked all notifications as read");
        Ok(marked)
    }

    pub async fn check_connectivity(&self) -> Result<(), NotifyError> {
        check_connectivity(self.store.as_ref(), self.connectivity_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::feed::MEMBER_FEED_FUNCTION;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn transaction_row(id: &str, owner: &str, is_read: bool, created_at: &str) -> serde_json::Value {
        json!({
            "id": id, "owner_id": owner, "title": "Deposit", "message": "Savings credited",
            "kind": "transaction", "is_read": is_read, "data": null,
            "created_at": created_at, "updated_at": created_at
        })
    }

    async fn service_with(store: Arc<InMemoryStore>) -> NotificationService {
        NotificationService::new(store, &NotificationSettings::default())
    }

    #[tokio::test]
    async fn test_second_fetch_within_ttl_hits_cache() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed(
                Collection::TransactionNotification,
                vec![transaction_row("t1", "m1", false, "2024-02-10T08:00:00Z")],
            )
            .await;
        let service = service_with(store.clone()).await;

        service.get_notifications("m1", None, false).await.unwrap();
        let queries = store.query_count();
        let functions = store.function_call_count();

        let again = service.get_notifications("m1", None, false).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(store.query_count(), queries);
        assert_eq!(store.function_call_count(), functions);

        service.get_notifications("m1", None, true).await.unwrap();
        assert_eq!(store.function_call_count(), functions + 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_invalidates_owner_cache() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed(
                Collection::TransactionNotification,
                vec![transaction_row("t1", "m1", false, "2024-02-10T08:00:00Z")],
            )
            .await;
        let service = service_with(store.clone()).await;

        let before = service.get_notifications("m1", None, false).await.unwrap();
        assert!(!before[0].is_read());

        assert!(service.mark_as_read("t1", None, Some("m1")).await);

        let after = service.get_notifications("m1", None, false).await.unwrap();
        assert!(after[0].is_read());
    }

    #[tokio::test]
    async fn test_explicit_source_mark_as_read_refetches_feed() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed(
                Collection::TransactionNotification,
                vec![transaction_row("123", "user-123", false, "2024-02-10T08:00:00Z")],
            )
            .await;
        let service = service_with(store.clone()).await;

        service.get_notifications("user-123", None, false).await.unwrap();
        let calls = store.function_call_count();

        assert!(
            service
                .mark_as_read("123", Some(NotificationSource::Transaction), Some("user-123"))
                .await
        );

        let feed = service.get_notifications("user-123", None, false).await.unwrap();
        assert_eq!(store.function_call_count(), calls + 1);
        assert!(feed[0].is_read());
    }

    #[tokio::test]
    async fn test_mark_as_read_missing_id_is_false_without_writes() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(store.clone()).await;

        assert!(!service.mark_as_read("non-existent-id", None, None).await);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_feed_errors_propagate() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_collection(Collection::TransactionNotification).await;
        let service = service_with(store.clone()).await;

        let result = service.get_notifications("m1", None, false).await;
        assert!(matches!(result, Err(NotifyError::TransientRemote(_))));
    }

    #[tokio::test]
    async fn test_unread_count_and_mark_all() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed(
                Collection::TransactionNotification,
                vec![
                    transaction_row("t1", "m1", false, "2024-02-10T08:00:00Z"),
                    transaction_row("t2", "m1", true, "2024-02-09T08:00:00Z"),
                    transaction_row("t3", "m2", false, "2024-02-09T08:00:00Z"),
                ],
            )
            .await;
        store
            .seed(
                Collection::GlobalNotification,
                vec![json!({"id": "g1", "title": "Holiday", "message": "Closed",
                            "kind": "announcement", "created_at": "2024-02-11T08:00:00Z"})],
            )
            .await;
        let service = service_with(store.clone()).await;

        assert_eq!(service.unread_count("m1").await.unwrap(), 2);
        assert_eq!(service.mark_all_as_read("m1").await.unwrap(), 2);
        assert_eq!(service.unread_count("m1").await.unwrap(), 0);
        assert_eq!(service.unread_count("m2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_server_function_feed_is_used_when_registered() {
        let store = Arc::new(InMemoryStore::new());
        store
            .register_function(
                MEMBER_FEED_FUNCTION,
                |_| {
                    Ok(vec![json!({
                        "source": "transaction", "id": "t9", "owner_id": "m1", "title": "Deposit",
                        "message": "Credited", "kind": "transaction", "is_read": false, "data": null,
                        "created_at": "2024-02-10T08:00:00Z", "updated_at": "2024-02-10T08:00:00Z"
                    })])
                },
            )
            .await;
        let service = service_with(store.clone()).await;

        let feed = service.get_notifications("m1", Some(10), false).await.unwrap();
        assert_eq!(feed[0].id(), "t9");
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_connectivity_check_passes_for_live_store() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(store).await;
        assert!(service.check_connectivity().await.is_ok());
    }
}
