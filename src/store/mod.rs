//! Remote store gateway
//!
//! The notification core talks to its backing store only through the
//! [`RemoteStore`] trait: filtered reads, inserts and patch updates against a
//! fixed set of named collections, plus named server-side functions. Rows
//! travel as JSON objects and are decoded into typed models by the caller.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Collections the notification core reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Loan,
    TransactionNotification,
    GlobalNotification,
    GlobalReadStatus,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Loan => "loan",
            Collection::TransactionNotification => "transaction-notification",
            Collection::GlobalNotification => "global-notification",
            Collection::GlobalReadStatus => "global-read-status",
        }
    }

    /// Backing table in the relational store
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Loan => "loans",
            Collection::TransactionNotification => "transaction_notifications",
            Collection::GlobalNotification => "global_notifications",
            Collection::GlobalReadStatus => "global_read_status",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar bound into a filter or a server function call
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Timestamp(DateTime<Utc>),
    TextList(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    In,
}

/// One predicate on a column; predicates in a slice are AND-ed
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub op: FilterOp,
    pub value: FieldValue,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            column,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            column,
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn one_of(column: &'static str, values: Vec<String>) -> Self {
        Self {
            column,
            op: FilterOp::In,
            value: FieldValue::TextList(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub column: &'static str,
    pub descending: bool,
}

impl Ordering {
    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Gateway failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unknown server function: {0}")]
    UnknownFunction(String),

    #[error("Row decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Filtered reads and writes against the remote relational store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        ordering: Option<Ordering>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Insert one row, returning it as stored
    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, StoreError>;

    /// Apply `patch` to every row matching `filters`; returns the affected row count
    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<u64, StoreError>;

    async fn call_function(&self, name: &str, args: &[FieldValue])
        -> Result<Vec<Value>, StoreError>;

    /// Cheapest possible round trip, used by the connectivity probe
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Column and function names are spliced into SQL, so only plain snake_case passes
pub(crate) fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase() || c == '_')
            .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
