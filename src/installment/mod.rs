//! Installment schedule derivation and due-date classification
//!
//! Both halves are pure: they take a loan (or its schedule) and a calendar day
//! and never touch the store.

mod classifier;
mod schedule;

pub use classifier::{
    classify, classify_schedule, DueSoon, DueStatus, UpcomingInstallment, DEFAULT_WINDOW_DAYS,
};
pub use schedule::{billable_months, installment_amount, installment_schedule, term_months};
