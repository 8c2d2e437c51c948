//! Installment reminder and read-state scenarios
//!
//! Runs the notification service end to end against the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use coopnotify_server::config::NotificationSettings;
use coopnotify_server::installment::{classify, installment_schedule, DueStatus};
use coopnotify_server::loan::Loan;
use coopnotify_server::notification::{
    DueDateReminderPayload, NotificationService, NotificationSource, OwnerScope,
    TransactionNotification, KIND_DUE_DATE,
};
use coopnotify_server::store::{Collection, InMemoryStore};

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn loan_row(id: &str, owner: &str, status: &str, remaining: i64) -> Value {
    json!({
        "id": id,
        "owner_id": owner,
        "loan_type": "Consumer Loan",
        "created_at": "2024-01-15T09:00:00Z",
        "due_date": "2024-04-15",
        "total_payment": 3_000_000,
        "remaining_payment": remaining,
        "status": status
    })
}

async fn setup(loans: Vec<Value>) -> (Arc<InMemoryStore>, NotificationService) {
    let store = Arc::new(InMemoryStore::new());
    store.seed(Collection::Loan, loans).await;
    let service = NotificationService::new(store.clone(), &NotificationSettings::default());
    (store, service)
}

async fn reminders(store: &InMemoryStore) -> Vec<TransactionNotification> {
    store
        .rows(Collection::TransactionNotification)
        .await
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .filter(|n: &TransactionNotification| n.kind == KIND_DUE_DATE)
        .collect()
}

// ============================================================================
// Schedule and classification
// ============================================================================

#[test]
fn test_three_month_loan_schedule() {
    let loan: Loan = serde_json::from_value(loan_row("l1", "m1", "active", 3_000_000)).unwrap();
    assert_eq!(
        installment_schedule(&loan),
        vec![date(2024, 2, 15), date(2024, 3, 15), date(2024, 4, 15)]
    );
}

#[test]
fn test_classification_around_first_installment() {
    assert_eq!(
        classify(date(2024, 2, 15), date(2024, 2, 15), 3),
        DueStatus::Today
    );
    assert_eq!(
        classify(date(2024, 2, 15), date(2024, 2, 13), 3),
        DueStatus::Upcoming { days_until: 2 }
    );
    assert_eq!(
        classify(date(2024, 2, 15), date(2024, 2, 10), 3),
        DueStatus::NotDue
    );
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_due_today_reminder_created_once() {
    let (store, service) = setup(vec![loan_row("l1", "m1", "active", 3_000_000)]).await;
    let now = at("2024-02-15T10:00:00Z");

    let first = service
        .reconcile_loans(OwnerScope::One("m1".to_string()), now)
        .await;
    let second = service
        .reconcile_loans(OwnerScope::One("m1".to_string()), now)
        .await;

    assert_eq!(first.reminders_created, 1);
    assert_eq!(second.reminders_created, 0);

    let created = reminders(&store).await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Payment Due Today");
    assert_eq!(created[0].owner_id, "m1");
    assert!(!created[0].is_read);

    let payload: DueDateReminderPayload = created[0].reminder_payload().unwrap().unwrap();
    assert_eq!(payload.loan_id, "l1");
    assert_eq!(payload.installment_date, date(2024, 2, 15));
    assert_eq!(payload.installment_amount, 1_000_000);
}

#[tokio::test]
async fn test_upcoming_reminder_then_due_day_does_not_duplicate() {
    let (store, service) = setup(vec![loan_row("l1", "m1", "approved", 3_000_000)]).await;

    let early = service
        .reconcile_loans(OwnerScope::All, at("2024-02-13T07:00:00Z"))
        .await;
    assert_eq!(early.reminders_created, 1);

    let created = reminders(&store).await;
    assert_eq!(created[0].title, "Upcoming Payment Reminder");

    let due_day = service
        .reconcile_loans(OwnerScope::All, at("2024-02-15T07:00:00Z"))
        .await;
    assert_eq!(due_day.reminders_created, 0);
    assert_eq!(reminders(&store).await.len(), 1);
}

#[tokio::test]
async fn test_only_repaying_loans_are_reminded() {
    let (store, service) = setup(vec![
        loan_row("l1", "m1", "settled", 3_000_000),
        loan_row("l2", "m2", "rejected", 3_000_000),
        loan_row("l3", "m3", "active", 0),
        loan_row("l4", "m4", "active", 1_000_000),
    ])
    .await;

    let report = service
        .reconcile_loans(OwnerScope::All, at("2024-02-15T10:00:00Z"))
        .await;

    assert_eq!(report.loans_checked, 1);
    assert_eq!(report.reminders_created, 1);
    assert_eq!(reminders(&store).await[0].owner_id, "m4");
}

#[tokio::test]
async fn test_unreadable_payload_does_not_block_reminder() {
    let (store, service) = setup(vec![loan_row("l1", "m1", "active", 3_000_000)]).await;
    store
        .seed(
            Collection::TransactionNotification,
            vec![json!({
                "id": "broken", "owner_id": "m1", "title": "Payment Due Today",
                "message": "legacy", "kind": "due_date", "is_read": false,
                "data": "{not json",
                "created_at": "2024-02-15T01:00:00Z", "updated_at": "2024-02-15T01:00:00Z"
            })],
        )
        .await;

    let report = service
        .reconcile_loans(OwnerScope::One("m1".to_string()), at("2024-02-15T10:00:00Z"))
        .await;

    assert_eq!(report.reminders_created, 1);
    assert_eq!(report.loans_failed, 0);
}

#[tokio::test]
async fn test_store_failure_is_reported_not_raised() {
    let (store, service) = setup(vec![loan_row("l1", "m1", "active", 3_000_000)]).await;
    store.fail_collection(Collection::TransactionNotification).await;

    let report = service
        .reconcile_loans(OwnerScope::All, at("2024-02-15T10:00:00Z"))
        .await;

    assert_eq!(report.loans_checked, 1);
    assert_eq!(report.loans_failed, 1);
    assert_eq!(report.reminders_created, 0);

    store.restore_collection(Collection::TransactionNotification).await;
    let retry = service
        .reconcile_loans(OwnerScope::All, at("2024-02-15T16:00:00Z"))
        .await;
    assert_eq!(retry.reminders_created, 1);
}

// ============================================================================
// Feed and read state
// ============================================================================

#[tokio::test]
async fn test_new_reminder_shows_up_in_cached_feed() {
    let (_store, service) = setup(vec![loan_row("l1", "m1", "active", 3_000_000)]).await;
    let empty = service.get_notifications("m1", None, false).await.unwrap();
    assert!(empty.is_empty());

    service
        .reconcile_loans(OwnerScope::One("m1".to_string()), at("2024-02-15T10:00:00Z"))
        .await;

    let feed = service.get_notifications("m1", None, false).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind(), KIND_DUE_DATE);
    assert_eq!(feed[0].source(), NotificationSource::Transaction);

    assert!(service.mark_as_read(feed[0].id(), None, Some("m1")).await);
    assert_eq!(service.unread_count("m1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_global_read_is_tracked_per_member() {
    let (store, service) = setup(Vec::new()).await;
    store
        .seed(
            Collection::GlobalNotification,
            vec![json!({"id": "g1", "title": "Annual meeting", "message": "1 March",
                        "kind": "announcement", "created_at": "2024-02-11T08:00:00Z"})],
        )
        .await;

    assert!(
        service
            .mark_as_read("g1", Some(NotificationSource::Global), Some("m1"))
            .await
    );

    let m1 = service.get_notifications("m1", None, false).await.unwrap();
    let m2 = service.get_notifications("m2", None, false).await.unwrap();
    assert!(m1[0].is_read());
    assert!(!m2[0].is_read());

    // A global notification cannot be marked without knowing the member
    assert!(!service.mark_as_read("g1", None, None).await);
    assert_eq!(store.rows(Collection::GlobalReadStatus).await.len(), 1);
}
