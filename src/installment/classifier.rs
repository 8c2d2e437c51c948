//! Due-soon classification of installment dates

use chrono::NaiveDate;
use serde::Serialize;

/// Default lookahead, in days, for upcoming installments
pub const DEFAULT_WINDOW_DAYS: i64 = 3;

/// Where a single installment date stands relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Today,
    Upcoming { days_until: i64 },
    NotDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpcomingInstallment {
    pub date: NaiveDate,
    pub days_until: i64,
}

/// Installments of one schedule that warrant a reminder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueSoon {
    pub today: Option<NaiveDate>,
    pub upcoming: Vec<UpcomingInstallment>,
}

impl DueSoon {
    pub fn is_empty(&self) -> bool {
        self.today.is_none() && self.upcoming.is_empty()
    }
}

/// Classify one installment date against `today` with a `window_days` lookahead.
///
/// Same calendar day is `Today`; anything later but no more than `window_days`
/// ahead is `Upcoming`. Past dates and dates beyond the window are `NotDue`.
pub fn classify(installment: NaiveDate, today: NaiveDate, window_days: i64) -> DueStatus {
    let days_until = (installment - today).num_days();
    match days_until {
        0 => DueStatus::Today,
        d if d > 0 && d <= window_days => DueStatus::Upcoming { days_until: d },
        _ => DueStatus::NotDue,
    }
}

/// Classify a whole schedule. Each qualifying date is reported once.
pub fn classify_schedule(schedule: &[NaiveDate], today: NaiveDate, window_days: i64) -> DueSoon {
    let mut due = DueSoon::default();

    for &date in schedule {
        match classify(date, today, window_days) {
            DueStatus::Today => {
                due.today.get_or_insert(date);
            }
            DueStatus::Upcoming { days_until } => {
                if !due.upcoming.iter().any(|u| u.date == date) {
                    due.upcoming.push(UpcomingInstallment { date, days_until });
                }
            }
            DueStatus::NotDue => {}
        }
    }

    due
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_classify_single_dates() {
        let today = date(2024, 2, 13);
        assert_eq!(classify(date(2024, 2, 13), today, 3), DueStatus::Today);
        assert_eq!(
            classify(date(2024, 2, 15), today, 3),
            DueStatus::Upcoming { days_until: 2 }
        );
        assert_eq!(
            classify(date(2024, 2, 16), today, 3),
            DueStatus::Upcoming { days_until: 3 }
        );
        assert_eq!(classify(date(2024, 2, 17), today, 3), DueStatus::NotDue);
        assert_eq!(classify(date(2024, 2, 12), today, 3), DueStatus::NotDue);
    }

    #[test]
    fn test_schedule_due_today() {
        let schedule = [date(2024, 2, 15), date(2024, 3, 15), date(2024, 4, 15)];
        let due = classify_schedule(&schedule, date(2024, 2, 15), DEFAULT_WINDOW_DAYS);

        assert_eq!(due.today, Some(date(2024, 2, 15)));
        assert!(due.upcoming.is_empty());
    }

    #[test]
    fn test_schedule_upcoming_within_window() {
        let schedule = [date(2024, 2, 15), date(2024, 3, 15)];
        let due = classify_schedule(&schedule, date(2024, 2, 13), 3);

        assert_eq!(due.today, None);
        assert_eq!(
            due.upcoming,
            vec![UpcomingInstallment {
                date: date(2024, 2, 15),
                days_until: 2
            }]
        );
    }

    #[test]
    fn test_several_upcoming_dates_are_reported_independently() {
        // Rolled-over anchor days can put two installments a few days apart
        let schedule = [date(2023, 3, 3), date(2023, 3, 4), date(2023, 3, 31)];
        let due = classify_schedule(&schedule, date(2023, 3, 1), 3);

        assert_eq!(due.upcoming.len(), 2);
        assert_eq!(due.upcoming[0].days_until, 2);
        assert_eq!(due.upcoming[1].days_until, 3);
    }

    #[test]
    fn test_nothing_due() {
        let schedule = [date(2024, 5, 1)];
        let due = classify_schedule(&schedule, date(2024, 2, 13), 3);
        assert!(due.is_empty());
    }
}
