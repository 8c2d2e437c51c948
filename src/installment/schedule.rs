//! Installment schedule calculator

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::loan::Loan;

/// Whole calendar months between the start month and the due month.
///
/// Day-of-month is ignored, so a loan opened on the 31st and due on the 1st of
/// the next month still spans one month.
pub fn term_months(start: NaiveDate, due: NaiveDate) -> i32 {
    (due.year() * 12 + due.month() as i32) - (start.year() * 12 + start.month() as i32)
}

/// Number of installments the total is split across; short-term loans count as one
pub fn billable_months(loan: &Loan) -> i64 {
    term_months(loan.created_at.date_naive(), loan.due_date).max(1) as i64
}

/// Rounded amount of a single installment
pub fn installment_amount(loan: &Loan) -> i64 {
    (loan.total_payment as f64 / billable_months(loan) as f64).round() as i64
}

/// Date `months_ahead` months after `start`, with the day forced to `day`.
///
/// The day is applied as an offset from the first of the target month, so a
/// day past the end of that month rolls over into the next one (day 31 in
/// February lands in early March) instead of clamping.
fn anchored_date(start: NaiveDate, months_ahead: u32, day: u32) -> Option<NaiveDate> {
    let first_of_month = start.checked_sub_days(Days::new(start.day0() as u64))?;
    first_of_month
        .checked_add_months(Months::new(months_ahead))?
        .checked_add_days(Days::new(day.saturating_sub(1) as u64))
}

/// Ordered installment dates for a loan.
///
/// Loans whose due date falls in the month they were opened (or earlier)
/// collapse to a single installment on the due date. Otherwise there is one
/// installment per month, each on the loan's opening day-of-month.
pub fn installment_schedule(loan: &Loan) -> Vec<NaiveDate> {
    let start = loan.created_at.date_naive();
    let term = term_months(start, loan.due_date);

    if term <= 0 {
        return vec![loan.due_date];
    }

    let anchor_day = start.day();
    (1..=term as u32)
        .filter_map(|i| anchored_date(start, i, anchor_day))
        .collect()
}
