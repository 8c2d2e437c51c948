//! Member notification feed loading
//!
//! The preferred path is one aggregated server-side call. When that call fails
//! or returns nothing, the feed is assembled from direct collection queries.
//! Each path is a [`FeedSource`] so either can be exercised on its own.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NotifyError;
use crate::store::{Collection, FieldValue, Filter, Ordering, RemoteStore};

use super::model::{GlobalFeedItem, GlobalNotification, GlobalReadStatus, Notification};

/// Server-side function returning a member's merged feed
pub const MEMBER_FEED_FUNCTION: &str = "get_member_notifications";

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Newest-first notifications for a member, at most `limit` of them
    async fn load(&self, owner_id: &str, limit: usize) -> Result<Vec<Notification>, NotifyError>;

    fn name(&self) -> &'static str;
}

fn decode_rows(rows: Vec<Value>) -> Vec<Notification> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Notification>(row) {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable feed row");
                None
            }
        })
        .collect()
}

/// Feed from the aggregated server function
pub struct ServerFunctionFeed {
    store: Arc<dyn RemoteStore>,
}

impl ServerFunctionFeed {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeedSource for ServerFunctionFeed {
    async fn load(&self, owner_id: &str, limit: usize) -> Result<Vec<Notification>, NotifyError> {
        let rows = self
            .store
            .call_function(
                MEMBER_FEED_FUNCTION,
                &[
                    FieldValue::from(owner_id),
                    FieldValue::Int(limit as i64),
                ],
            )
            .await?;
        Ok(decode_rows(rows))
    }

    fn name(&self) -> &'static str {
        "server-function"
    }
}

/// Feed assembled from the notification collections directly
pub struct DirectQueryFeed {
    store: Arc<dyn RemoteStore>,
}

impl DirectQueryFeed {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    async fn read_global_ids(
        &self,
        owner_id: &str,
        global_ids: Vec<String>,
    ) -> Result<HashSet<String>, NotifyError> {
        if global_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = self
            .store
            .query(
                Collection::GlobalReadStatus,
                &[
                    Filter::eq("owner_id", owner_id),
                    Filter::one_of("global_notification_id", global_ids),
                ],
                None,
                None,
            )
            .await?;

        let mut read = HashSet::new();
        for row in rows {
            let status: GlobalReadStatus = serde_json::from_value(row)?;
            if status.is_read {
                read.insert(status.global_notification_id);
            }
        }
        Ok(read)
    }
}

#[async_trait]
impl FeedSource for DirectQueryFeed {
    async fn load(&self, owner_id: &str, limit: usize) -> Result<Vec<Notification>, NotifyError> {
        let transaction_rows = self
            .store
            .query(
                Collection::TransactionNotification,
                &[Filter::eq("owner_id", owner_id)],
                Some(Ordering::desc("created_at")),
                Some(limit),
            )
            .await?;

        let global_rows = self
            .store
            .query(
                Collection::GlobalNotification,
                &[],
                Some(Ordering::desc("created_at")),
                Some(limit),
            )
            .await?;

        let mut globals = Vec::with_capacity(global_rows.len());
        for row in global_rows {
            match serde_json::from_value::<GlobalNotification>(row) {
                Ok(notification) => globals.push(notification),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable global notification"),
            }
        }

        let read = self
            .read_global_ids(owner_id, globals.iter().map(|g| g.id.clone()).collect())
            .await?;

        let mut feed: Vec<Notification> = transaction_rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(notification) => Some(Notification::Transaction(notification)),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable transaction notification");
                    None
                }
            })
            .collect();
        feed.extend(globals.into_iter().map(|notification| {
            let is_read = read.contains(&notification.id);
            Notification::Global(GlobalFeedItem {
                notification,
                is_read,
            })
        }));

        feed.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        feed.truncate(limit);
        Ok(feed)
    }

    fn name(&self) -> &'static str {
        "direct-query"
    }
}

/// Try `primary`; on error or an empty result, use `fallback`
pub struct FallbackFeed<P, F> {
    primary: P,
    fallback: F,
}

impl<P: FeedSource, F: FeedSource> FallbackFeed<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: FeedSource, F: FeedSource> FeedSource for FallbackFeed<P, F> {
    async fn load(&self, owner_id: &str, limit: usize) -> Result<Vec<Notification>, NotifyError> {
        match self.primary.load(owner_id, limit).await {
            Ok(feed) if !feed.is_empty() => return Ok(feed),
            Ok(_) => {
                tracing::debug!(
                    owner_id = owner_id,
                    primary = self.primary.name(),
                    "Primary feed empty, using fallback"
                );
            }
            Err(e) => {
                tracing::warn!(
                    owner_id = owner_id,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Primary feed failed, using fallback"
                );
            }
        }

        self.fallback.load(owner_id, limit).await
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// The standard feed: server function first, direct queries second
pub fn default_feed(store: Arc<dyn RemoteStore>) -> FallbackFeed<ServerFunctionFeed, DirectQueryFeed> {
    FallbackFeed::new(
        ServerFunctionFeed::new(store.clone()),
        DirectQueryFeed::new(store),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed(
                Collection::TransactionNotification,
                vec![
                    json!({
                        "id": "t1", "owner_id": "m1", "title": "Deposit", "message": "Savings credited",
                        "kind": "transaction", "is_read": false, "data": null,
                        "created_at": "2024-02-10T08:00:00Z", "updated_at": "2024-02-10T08:00:00Z"
                    }),
                    json!({
                        "id": "t2", "owner_id": "m2", "title": "Deposit", "message": "Other member",
                        "kind": "transaction", "is_read": false, "data": null,
                        "created_at": "2024-02-12T08:00:00Z", "updated_at": "2024-02-12T08:00:00Z"
                    }),
                ],
            )
            .await;
        store
            .seed(
                Collection::GlobalNotification,
                vec![
                    json!({"id": "g1", "title": "Holiday", "message": "Closed", "kind": "announcement",
                           "created_at": "2024-02-11T08:00:00Z"}),
                    json!({"id": "g2", "title": "Upgrade", "message": "New app", "kind": "system",
                           "created_at": "2024-02-09T08:00:00Z"}),
                ],
            )
            .await;
        store
            .seed(
                Collection::GlobalReadStatus,
                vec![json!({
                    "id": "s1", "global_notification_id": "g1", "owner_id": "m1", "is_read": true,
                    "created_at": "2024-02-11T09:00:00Z", "updated_at": "2024-02-11T09:00:00Z"
                })],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_direct_feed_merges_collections() {
        let store = seeded_store().await;
        let feed = DirectQueryFeed::new(store.clone());

        let items = feed.load("m1", 10).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|n| n.id()).collect();

        assert_eq!(ids, vec!["g1", "t1", "g2"]);
        assert!(items[0].is_read());
        assert!(!items[2].is_read());
    }

    #[tokio::test]
    async fn test_direct_feed_respects_limit() {
        let store = seeded_store().await;
        let feed = DirectQueryFeed::new(store.clone());

        let items = feed.load("m1", 2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id(), "g1");
    }

    #[tokio::test]
    async fn test_fallback_used_when_function_missing() {
        let store = seeded_store().await;
        let feed = default_feed(store.clone());

        let items = feed.load("m1", 10).await.unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(store.function_call_count(), 1);
    }

    #[tokio::test]
    async fn test_server_function_preferred_when_it_answers() {
        let store = seeded_store().await;
        store
            .register_function(
                MEMBER_FEED_FUNCTION,
                |args| {
                    assert_eq!(args[0], FieldValue::Text("m1".to_string()));
                    Ok(vec![json!({
                        "source": "global", "id": "g9", "owner_id": null, "title": "From function",
                        "message": "Aggregated", "kind": "system", "is_read": false, "data": null,
                        "created_at": "2024-02-13T08:00:00Z", "updated_at": "2024-02-13T08:00:00Z"
                    })])
                },
            )
            .await;
        let feed = default_feed(store.clone());

        let items = feed.load("m1", 10).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), "g9");
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_function_result_falls_back() {
        let store = seeded_store().await;
        store
            .register_function(MEMBER_FEED_FUNCTION, |_| Ok(Vec::new()))
            .await;
        let feed = default_feed(store.clone());

        let items = feed.load("m1", 10).await.unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn test_fallback_error_propagates() {
        let store = seeded_store().await;
        store.fail_collection(Collection::TransactionNotification).await;
        let feed = default_feed(store.clone());

        let result = feed.load("m1", 10).await;
        assert!(matches!(result, Err(NotifyError::TransientRemote(_))));
    }
}
