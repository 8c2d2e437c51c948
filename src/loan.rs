//! Loan records, as read from the financing subsystem
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Loan lifecycle status
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Proposed,
    Approved,
    Rejected,
    Active,
    Settled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Proposed => "proposed",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Active => "active",
            LoanStatus::Settled => "settled",
        }
    }

    /// Statuses whose installments are still being paid
    pub fn repaying() -> [LoanStatus; 2] {
        [LoanStatus::Approved, LoanStatus::Active]
    }
}

/// Loan model. Read-only to this service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    pub id: String,
    pub owner_id: String,
    pub loan_type: String,
    pub created_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub total_payment: i64,
    pub remaining_payment: i64,
    pub status: LoanStatus,
}

impl Loan {
    /// Whether reminders should still be raised for this loan
    pub fn awaits_payment(&self) -> bool {
        LoanStatus::repaying().contains(&self.status) && self.remaining_payment > 0
    }
}
