//! In-process store gateway
//!
//! Mirrors the Postgres gateway's filter semantics and uniqueness rules over
//! JSON rows held in memory. Used by the test suites and for running the
//! service without a database. Call counters and failure injection let tests
//! assert on remote traffic.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, FieldValue, Filter, FilterOp, Ordering, RemoteStore, StoreError};

/// Server-side function stand-in: receives the positional arguments
pub type ServerFn = Arc<dyn Fn(&[FieldValue]) -> Result<Vec<Value>, StoreError> + Send + Sync>;

#[derive(Default)]
struct Counters {
    queries: AtomicUsize,
    inserts: AtomicUsize,
    updated_rows: AtomicUsize,
    function_calls: AtomicUsize,
}

/// Store gateway over in-memory JSON rows
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<Collection, Vec<Value>>>>,
    functions: Arc<RwLock<HashMap<String, ServerFn>>>,
    failing: Arc<RwLock<HashSet<Collection>>>,
    ping_delay: Arc<RwLock<Option<Duration>>>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a collection without touching the counters
    pub async fn seed(&self, collection: Collection, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        tables.entry(collection).or_default().extend(rows);
    }

    pub async fn rows(&self, collection: Collection) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables.get(&collection).cloned().unwrap_or_default()
    }

    pub async fn register_function<F>(&self, name: &str, function: F)
    where
        F: Fn(&[FieldValue]) -> Result<Vec<Value>, StoreError> + Send + Sync + 'static,
    {
        let mut functions = self.functions.write().await;
        functions.insert(name.to_string(), Arc::new(function) as ServerFn);
    }

    /// Make every operation on `collection` fail until restored
    pub async fn fail_collection(&self, collection: Collection) {
        self.failing.write().await.insert(collection);
    }

    pub async fn restore_collection(&self, collection: Collection) {
        self.failing.write().await.remove(&collection);
    }

    /// Delay applied to `ping`, to exercise the connectivity timeout
    pub async fn set_ping_delay(&self, delay: Option<Duration>) {
        *self.ping_delay.write().await = delay;
    }

    pub fn query_count(&self) -> usize {
        self.counters.queries.load(AtomicOrdering::SeqCst)
    }

    /// Inserted rows plus rows changed by updates
    pub fn write_count(&self) -> usize {
        self.counters.inserts.load(AtomicOrdering::SeqCst)
            + self.counters.updated_rows.load(AtomicOrdering::SeqCst)
    }

    pub fn function_call_count(&self) -> usize {
        self.counters.function_calls.load(AtomicOrdering::SeqCst)
    }

    async fn ensure_available(&self, collection: Collection) -> Result<(), StoreError> {
        if self.failing.read().await.contains(&collection) {
            return Err(StoreError::Unavailable(format!(
                "{} is unavailable",
                collection
            )));
        }
        Ok(())
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let Some(field) = row.get(filter.column) else {
        return false;
    };

    match (&filter.op, &filter.value) {
        (_, FieldValue::TextList(values)) => text_of(field)
            .map(|text| values.contains(&text))
            .unwrap_or(false),
        (FilterOp::Gte, FieldValue::Timestamp(ts)) => {
            timestamp_of(field).map(|v| v >= *ts).unwrap_or(false)
        }
        (FilterOp::Gte, FieldValue::Int(n)) => field.as_i64().map(|v| v >= *n).unwrap_or(false),
        (FilterOp::Gte, FieldValue::Text(s)) => {
            text_of(field).map(|v| v.as_str() >= s.as_str()).unwrap_or(false)
        }
        (_, FieldValue::Text(s)) => text_of(field).as_deref() == Some(s.as_str()),
        (_, FieldValue::Bool(b)) => field.as_bool() == Some(*b),
        (_, FieldValue::Int(n)) => field.as_i64() == Some(*n),
        (_, FieldValue::Timestamp(ts)) => timestamp_of(field) == Some(*ts),
    }
}

fn compare(a: &Value, b: &Value) -> CmpOrdering {
    if let (Some(x), Some(y)) = (timestamp_of(a), timestamp_of(b)) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal);
    }
    text_of(a).cmp(&text_of(b))
}

/// Column groups that must be unique per collection, beyond the id
fn unique_keys(collection: Collection) -> &'static [&'static [&'static str]] {
    match collection {
        Collection::GlobalReadStatus => &[&["id"], &["global_notification_id", "owner_id"]],
        _ => &[&["id"]],
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        ordering: Option<Ordering>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        self.counters.queries.fetch_add(1, AtomicOrdering::SeqCst);
        self.ensure_available(collection).await?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(ordering) = ordering {
            rows.sort_by(|a, b| {
                let null = Value::Null;
                let x = a.get(ordering.column).unwrap_or(&null);
                let y = b.get(ordering.column).unwrap_or(&null);
                let order = compare(x, y);
                if ordering.descending {
                    order.reverse()
                } else {
                    order
                }
            });
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut row: Value) -> Result<Value, StoreError> {
        self.ensure_available(collection).await?;

        let object = row
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidIdentifier("row must be an object".to_string()))?;
        if object.get("id").map(Value::is_null).unwrap_or(true) {
            object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();

        for key in unique_keys(collection) {
            let clash = rows.iter().any(|existing| {
                key.iter()
                    .all(|column| existing.get(*column) == row.get(*column))
            });
            if clash {
                return Err(StoreError::Conflict(format!(
                    "{} already has a row with ({})",
                    collection,
                    key.join(", ")
                )));
            }
        }

        rows.push(row.clone());
        self.counters.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<u64, StoreError> {
        self.ensure_available(collection).await?;

        let patch = match patch {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(StoreError::InvalidIdentifier("<empty patch>".to_string())),
        };

        let mut tables = self.tables.write().await;
        let mut affected = 0u64;
        if let Some(rows) = tables.get_mut(&collection) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| matches(row, f)))
            {
                if let Some(object) = row.as_object_mut() {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
        }

        self.counters
            .updated_rows
            .fetch_add(affected as usize, AtomicOrdering::SeqCst);
        Ok(affected)
    }

    async fn call_function(
        &self,
        name: &str,
        args: &[FieldValue],
    ) -> Result<Vec<Value>, StoreError> {
        self.counters.function_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let function = {
            let functions = self.functions.read().await;
            functions.get(name).cloned()
        };

        match function {
            Some(function) => function(args),
            None => Err(StoreError::UnknownFunction(name.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let delay = *self.ping_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}
