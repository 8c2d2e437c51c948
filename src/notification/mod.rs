//! Notification lifecycle: reminders, read state, feed and cache

pub mod cache;
pub mod feed;
pub mod model;
pub mod read_status;
pub mod reminder;
pub mod service;

pub use cache::{CacheEntry, FetchCache};
pub use feed::{default_feed, DirectQueryFeed, FallbackFeed, FeedSource, ServerFunctionFeed};
pub use model::{
    DueDateReminderPayload, GlobalFeedItem, GlobalNotification, GlobalReadStatus, Notification,
    NotificationSource, TransactionNotification, KIND_DUE_DATE,
};
pub use read_status::{ReadOutcome, ReadStatusResolver};
pub use reminder::{OwnerScope, ReconcileReport, ReminderEngine};
pub use service::NotificationService;
