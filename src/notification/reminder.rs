//! Installment reminder engine
//!
//! Derives each loan's schedule, finds installments due today or within the
//! lookahead window, and writes one reminder per (loan, installment date).
//! Existing reminders are re-read from the store on every run, so repeated or
//! overlapping triggers converge instead of piling up duplicates.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::config::NotificationSettings;
use crate::error::NotifyError;
use crate::installment::{classify_schedule, installment_amount, installment_schedule};
use crate::loan::{Loan, LoanStatus};
use crate::store::{Collection, Filter, RemoteStore};

use super::model::{DueDateReminderPayload, ReminderKey, TransactionNotification, KIND_DUE_DATE};

pub const TITLE_DUE_TODAY: &str = "Payment Due Today";
pub const TITLE_UPCOMING: &str = "Upcoming Payment Reminder";

/// Which members a reconciliation run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    One(String),
    All,
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub loans_checked: usize,
    pub reminders_created: usize,
    pub loans_failed: usize,
}

/// Reminder due for creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reminder {
    DueToday(NaiveDate),
    Upcoming { date: NaiveDate, days_until: i64 },
}

impl Reminder {
    fn date(&self) -> NaiveDate {
        match self {
            Reminder::DueToday(date) => *date,
            Reminder::Upcoming { date, .. } => *date,
        }
    }
}

pub struct ReminderEngine {
    store: Arc<dyn RemoteStore>,
    window_days: i64,
    lookback_days: i64,
    concurrency: usize,
}

impl ReminderEngine {
    pub fn new(store: Arc<dyn RemoteStore>, settings: &NotificationSettings) -> Self {
        Self {
            store,
            window_days: settings.due_soon_window_days,
            lookback_days: settings.reminder_lookback_days,
            concurrency: settings.reconcile_concurrency.max(1),
        }
    }

    /// Reconcile every repaying loan in `scope`.
    ///
    /// A failure on one loan is logged and counted; the remaining loans are
    /// still processed.
    pub async fn reconcile_loans(&self, scope: OwnerScope, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let loans = match self.load_loans(&scope).await {
            Ok(loans) => loans,
            Err(e) => {
                tracing::error!(scope = ?scope, error = %e, "Failed to load loans for reconciliation");
                return report;
            }
        };

        let outcomes: Vec<(Loan, Result<usize, NotifyError>)> = stream::iter(loans)
            .map(|loan| async move {
                let outcome = self.reconcile(&loan, now).await;
                (loan, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (loan, outcome) in outcomes {
            report.loans_checked += 1;
            match outcome {
                Ok(created) => report.reminders_created += created,
                Err(e) => {
                    report.loans_failed += 1;
                    tracing::error!(
                        loan_id = %loan.id,
                        owner_id = %loan.owner_id,
                        error = %e,
                        "Installment reconciliation failed"
                    );
                }
            }
        }

        report
    }

    /// Create any missing reminders for one loan; returns how many were written
    pub async fn reconcile(&self, loan: &Loan, now: DateTime<Utc>) -> Result<usize, NotifyError> {
        let today = now.date_naive();
        let schedule = installment_schedule(loan);
        let due = classify_schedule(&schedule, today, self.window_days);
        if due.is_empty() {
            return Ok(0);
        }

        let mut notified = self.existing_reminder_keys(&loan.owner_id, now).await?;

        let candidates = due.today.map(Reminder::DueToday).into_iter().chain(
            due.upcoming
                .iter()
                .map(|u| Reminder::Upcoming {
                    date: u.date,
                    days_until: u.days_until,
                }),
        );

        let mut created = 0;
        for reminder in candidates {
            let key = (loan.id.clone(), reminder.date());
            if notified.contains(&key) {
                tracing::debug!(loan_id = %loan.id, date = %reminder.date(), "Reminder already exists");
                continue;
            }

            self.create_reminder(loan, reminder, now).await?;
            notified.insert(key);
            created += 1;
        }

        Ok(created)
    }

    async fn load_loans(&self, scope: &OwnerScope) -> Result<Vec<Loan>, NotifyError> {
        let mut filters = vec![Filter::one_of(
            "status",
            LoanStatus::repaying()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        )];
        if let OwnerScope::One(owner_id) = scope {
            filters.push(Filter::eq("owner_id", owner_id.as_str()));
        }

        let rows = self
            .store
            .query(Collection::Loan, &filters, None, None)
            .await?;

        let loans = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Loan>(row) {
                Ok(loan) => Some(loan),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable loan row");
                    None
                }
            })
            .filter(Loan::awaits_payment)
            .collect();

        Ok(loans)
    }

    /// Keys of due-date reminders the member received within the lookback window.
    ///
    /// Rows whose payload does not decode cannot match any installment and are
    /// skipped.
    async fn existing_reminder_keys(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<HashSet<ReminderKey>, NotifyError> {
        let since = now - Duration::days(self.lookback_days);
        let rows = self
            .store
            .query(
                Collection::TransactionNotification,
                &[
                    Filter::eq("owner_id", owner_id),
                    Filter::eq("kind", KIND_DUE_DATE),
                    Filter::gte("created_at", since),
                ],
                None,
                None,
            )
            .await?;

        let mut keys = HashSet::new();
        for row in rows {
            let payload = serde_json::from_value::<TransactionNotification>(row)
                .map_err(NotifyError::from)
                .and_then(|n| n.reminder_payload());

            match payload {
                Ok(Some(payload)) => {
                    keys.insert(payload.key());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(owner_id = %owner_id, error = %e, "Ignoring reminder with unreadable payload");
                }
            }
        }

        Ok(keys)
    }

    async fn create_reminder(
        &self,
        loan: &Loan,
        reminder: Reminder,
        now: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let amount = installment_amount(loan);
        let date = reminder.date();
        let formatted_date = date.format("%d %B %Y");

        let (title, message) = match reminder {
            Reminder::DueToday(_) => (
                TITLE_DUE_TODAY,
                format!(
                    "Your {} installment of {} is due today, {}.",
                    loan.loan_type, amount, formatted_date
                ),
            ),
            Reminder::Upcoming { days_until, .. } => (
                TITLE_UPCOMING,
                format!(
                    "Your {} installment of {} is due in {} day{}, on {}.",
                    loan.loan_type,
                    amount,
                    days_until,
                    if days_until == 1 { "" } else { "s" },
                    formatted_date
                ),
            ),
        };

        let payload = DueDateReminderPayload {
            loan_id: loan.id.clone(),
            installment_date: date,
            installment_amount: amount,
            loan_type: loan.loan_type.clone(),
            total_payment: loan.total_payment,
            remaining_payment: loan.remaining_payment,
        };

        let notification = TransactionNotification {
            id: Uuid::new_v4().to_string(),
            owner_id: loan.owner_id.clone(),
            title: title.to_string(),
            message,
            kind: KIND_DUE_DATE.to_string(),
            is_read: false,
            data: Some(payload.encode()?),
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(
                Collection::TransactionNotification,
                serde_json::to_value(&notification)?,
            )
            .await?;

        tracing::info!(
            owner_id = %loan.owner_id,
            loan_id = %loan.id,
            installment_date = %date,
            title = title,
            "Installment reminder created"
        );

        Ok(())
    }
}
