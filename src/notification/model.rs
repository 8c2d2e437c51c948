//! Notification records and the due-date reminder payload

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::NotifyError;

/// Kind tag carried by installment reminders
pub const KIND_DUE_DATE: &str = "due_date";

/// Which collection a notification lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    Transaction,
    Global,
}

impl NotificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSource::Transaction => "transaction",
            NotificationSource::Global => "global",
        }
    }
}

/// Per-member notification, mutated in place when read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionNotification {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    /// Structured payload serialized as JSON text
    #[serde(default)]
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionNotification {
    /// Decode the reminder payload, if this notification carries one
    pub fn reminder_payload(&self) -> Result<Option<DueDateReminderPayload>, NotifyError> {
        match self.data.as_deref() {
            None => Ok(None),
            Some(text) => DueDateReminderPayload::decode(text).map(Some),
        }
    }
}

/// Announcement shared by every member. Read state lives in [`GlobalReadStatus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Per-member read marker for a global notification.
///
/// At most one row exists per (global notification, member) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalReadStatus {
    pub id: String,
    pub global_notification_id: String,
    pub owner_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A global notification as seen by one member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalFeedItem {
    #[serde(flatten)]
    pub notification: GlobalNotification,
    #[serde(default)]
    pub is_read: bool,
}

/// Entry of a member's notification feed, tagged by source collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Notification {
    Transaction(TransactionNotification),
    Global(GlobalFeedItem),
}

impl Notification {
    pub fn id(&self) -> &str {
        match self {
            Notification::Transaction(n) => &n.id,
            Notification::Global(g) => &g.notification.id,
        }
    }

    pub fn source(&self) -> NotificationSource {
        match self {
            Notification::Transaction(_) => NotificationSource::Transaction,
            Notification::Global(_) => NotificationSource::Global,
        }
    }

    pub fn is_read(&self) -> bool {
        match self {
            Notification::Transaction(n) => n.is_read,
            Notification::Global(g) => g.is_read,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Notification::Transaction(n) => n.created_at,
            Notification::Global(g) => g.notification.created_at,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Notification::Transaction(n) => &n.kind,
            Notification::Global(g) => &g.notification.kind,
        }
    }
}

/// Payload attached to installment reminders.
///
/// `(loan_id, installment_date)` identifies the installment a reminder was
/// raised for and is what deduplication keys on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DueDateReminderPayload {
    pub loan_id: String,
    #[serde(deserialize_with = "date_or_datetime")]
    pub installment_date: NaiveDate,
    pub installment_amount: i64,
    pub loan_type: String,
    pub total_payment: i64,
    pub remaining_payment: i64,
}

pub type ReminderKey = (String, NaiveDate);

impl DueDateReminderPayload {
    pub fn key(&self) -> ReminderKey {
        (self.loan_id.clone(), self.installment_date)
    }

    pub fn encode(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, NotifyError> {
        serde_json::from_str(text).map_err(|e| NotifyError::Decode(e.to_string()))
    }
}

/// Accept a plain ISO date or a full RFC 3339 timestamp (older reminders)
fn date_or_datetime<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(serde::de::Error::custom)
}
