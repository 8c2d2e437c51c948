//! Time-bounded per-member cache of fetched lists

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::NotifyError;

/// Cached list for one member
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Vec<T>,
    pub last_fetched: Option<Instant>,
    pub loading: bool,
    pub error: Option<String>,
    limit: usize,
}

impl<T> CacheEntry<T> {
    fn empty(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            last_fetched: None,
            loading: false,
            error: None,
            limit,
        }
    }
}

/// Per-member list cache with a time-to-live.
///
/// A cached list is served only while it is younger than the TTL, non-empty,
/// and was fetched with the same limit. Anything else goes to the fetcher and
/// replaces the entry. Concurrent misses are not coalesced.
///
/// A fetch that started before an invalidation of its member still returns
/// its result but never stores it.
#[derive(Clone)]
pub struct FetchCache<T> {
    state: Arc<RwLock<CacheState<T>>>,
    ttl: Duration,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Bumped per member by `invalidate(Some(..))`
    generations: HashMap<String, u64>,
    /// Bumped by `invalidate(None)`
    epoch: u64,
}

impl<T> CacheState<T> {
    fn generation(&self, owner_id: &str) -> (u64, u64) {
        (
            self.epoch,
            self.generations.get(owner_id).copied().unwrap_or(0),
        )
    }
}

impl<T: Clone + Send + Sync> FetchCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState {
                entries: HashMap::new(),
                generations: HashMap::new(),
                epoch: 0,
            })),
            ttl,
        }
    }

    /// Return the cached list for `owner_id` or refresh it through `fetcher`.
    ///
    /// `force_refresh` skips the freshness check. A failed fetch keeps the
    /// previous data, records the error on the entry and is returned to the
    /// caller.
    pub async fn fetch<F, Fut>(
        &self,
        owner_id: &str,
        limit: usize,
        force_refresh: bool,
        fetcher: F,
    ) -> Result<Vec<T>, NotifyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, NotifyError>>,
    {
        if !force_refresh {
            if let Some(data) = self.fresh(owner_id, limit).await {
                tracing::debug!(owner_id = owner_id, items = data.len(), "Notification cache hit");
                return Ok(data);
            }
        }

        tracing::debug!(owner_id = owner_id, force_refresh, "Notification cache miss");
        let generation = {
            let mut state = self.state.write().await;
            let entry = state
                .entries
                .entry(owner_id.to_string())
                .or_insert_with(|| CacheEntry::empty(limit));
            entry.loading = true;
            state.generation(owner_id)
        };

        let result = fetcher().await;

        let mut state = self.state.write().await;
        if state.generation(owner_id) != generation {
            tracing::debug!(owner_id = owner_id, "Cache invalidated during fetch, result not stored");
            return result;
        }

        match result {
            Ok(data) => {
                state.entries.insert(
                    owner_id.to_string(),
                    CacheEntry {
                        data: data.clone(),
                        last_fetched: Some(Instant::now()),
                        loading: false,
                        error: None,
                        limit,
                    },
                );
                Ok(data)
            }
            Err(e) => {
                if let Some(entry) = state.entries.get_mut(owner_id) {
                    entry.loading = false;
                    entry.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn fresh(&self, owner_id: &str, limit: usize) -> Option<Vec<T>> {
        let state = self.state.read().await;
        let entry = state.entries.get(owner_id)?;
        let fetched_at = entry.last_fetched?;

        let fresh = fetched_at.elapsed() < self.ttl
            && !entry.data.is_empty()
            && entry.limit == limit;
        fresh.then(|| entry.data.clone())
    }

    /// Drop one member's entry, or every entry when `owner_id` is `None`
    pub async fn invalidate(&self, owner_id: Option<&str>) {
        let mut state = self.state.write().await;
        match owner_id {
            Some(owner_id) => {
                state.entries.remove(owner_id);
                *state.generations.entry(owner_id.to_string()).or_insert(0) += 1;
            }
            None => {
                state.entries.clear();
                state.generations.clear();
                state.epoch += 1;
            }
        }
    }

    pub async fn entry(&self, owner_id: &str) -> Option<CacheEntry<T>> {
        self.state.read().await.entries.get(owner_id).cloned()
    }
}
