//! Elapsed working-day computation for effort estimation.
//!
//! The clock starts at the earliest commit authored timestamp on the PR,
//! not the first entry in the API's list order: rebases and cherry-picks
//! reorder the list, but the earliest authored work is the true start.

use chrono::{DateTime, Datelike, Utc, Weekday};

/// Earliest timestamp in `dates`, or `fallback` when the list is empty.
///
/// An empty commit list yields `fallback` (the evaluation instant), which
/// makes the elapsed working-day count come out to zero.
#[must_use]
pub fn earliest(dates: &[DateTime<Utc>], fallback: DateTime<Utc>) -> DateTime<Utc> {
    dates.iter().copied().min().unwrap_or(fallback)
}

/// Working days elapsed between `start` and `now`.
///
/// Counts every non-weekend calendar day from `start`'s date through
/// `now`'s date inclusive, then subtracts one, so a PR created and
/// evaluated on the same working day yields 0. Only the calendar dates
/// matter: any time of day on the same date gives the same result.
#[must_use]
pub fn working_days_since(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let mut day = start.date_naive();
    let last = now.date_naive();
    let mut count: i64 = 0;
    while day <= last {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    count - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn same_working_day_counts_zero() {
        // 2024-03-04 is a Monday.
        let opened = utc("2024-03-04T09:15:00Z");
        let evaluated = utc("2024-03-04T17:45:00Z");
        assert_eq!(working_days_since(opened, evaluated), 0);
    }

    #[test]
    fn weekdays_accumulate() {
        let monday = utc("2024-03-04T09:00:00Z");
        let friday = utc("2024-03-08T09:00:00Z");
        assert_eq!(working_days_since(monday, friday), 4);
    }

    #[test]
    fn weekends_do_not_count() {
        // Friday through the following Monday spans one weekend.
        let friday = utc("2024-03-01T16:00:00Z");
        let monday = utc("2024-03-04T10:00:00Z");
        assert_eq!(working_days_since(friday, monday), 1);
    }

    #[test]
    fn idempotent_under_re_truncation() {
        let now = utc("2024-03-08T12:00:00Z");
        let midnight = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let afternoon = Utc.with_ymd_and_hms(2024, 3, 4, 14, 33, 7).unwrap();
        assert_eq!(
            working_days_since(midnight, now),
            working_days_since(afternoon, now)
        );
    }

    #[test]
    fn earliest_ignores_list_order() {
        // Rebase reorder: Tuesday, Thursday, Monday.
        let dates = vec![
            utc("2024-03-05T10:00:00Z"),
            utc("2024-03-07T10:00:00Z"),
            utc("2024-03-04T10:00:00Z"),
        ];
        let fallback = utc("2024-03-08T00:00:00Z");
        assert_eq!(earliest(&dates, fallback), utc("2024-03-04T10:00:00Z"));
    }

    #[test]
    fn earliest_falls_back_on_empty_list() {
        let fallback = utc("2024-03-08T00:00:00Z");
        assert_eq!(earliest(&[], fallback), fallback);
        assert_eq!(working_days_since(fallback, fallback), 0);
    }
}
