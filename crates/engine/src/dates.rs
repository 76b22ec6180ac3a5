//! Date windows attached to computable allowances.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Validity window of an allowance instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_of_days: i64,
}

impl DateWindow {
    /// A window covering exactly `date`.
    #[must_use]
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
            num_of_days: 1,
        }
    }

    /// `[start, end]` counted as `end - start` days.
    #[must_use]
    pub fn exclusive(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            num_of_days: (end_date - start_date).num_days(),
        }
    }

    /// `[start, end]` counted as `end - start + 1` days.
    #[must_use]
    pub fn inclusive(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            num_of_days: (end_date - start_date).num_days() + 1,
        }
    }

    /// `[start, end]` counted with [`count_weekdays`].
    #[must_use]
    pub fn working_days(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            num_of_days: count_weekdays(start_date, end_date),
        }
    }
}

/// The day before departure.
pub(crate) fn travel_date(start_date: NaiveDate) -> Option<NaiveDate> {
    start_date.checked_sub_days(Days::new(1))
}

/// The day after the trip ends.
pub(crate) fn return_date(end_date: NaiveDate) -> Option<NaiveDate> {
    end_date.checked_add_days(Days::new(1))
}

/// Payable days in `[start, end]` (inclusive).
///
/// Weekdays are counted when there are at least two. One weekday surrounded
/// by a weekend pays one day; a weekend-only range pays its weekend days.
/// Any other range pays one day.
#[must_use]
pub fn count_weekdays(start: NaiveDate, end: NaiveDate) -> i64 {
    let (mut weekdays, mut weekend) = (0i64, 0i64);
    for day in start.iter_days().take_while(|d| *d <= end) {
        match day.weekday() {
            Weekday::Sat | Weekday::Sun => weekend += 1,
            _ => weekdays += 1,
        }
    }

    if weekdays > 1 {
        weekdays
    } else if weekdays == 1 && weekend > 1 {
        1
    } else if weekdays == 0 && weekend >= 1 {
        weekend
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 2024-03-04 is a Monday.
    #[test]
    fn counts_a_working_week() {
        assert_eq!(count_weekdays(d(2024, 3, 4), d(2024, 3, 8)), 5);
    }

    #[test]
    fn weekend_only_pays_weekend_days() {
        assert_eq!(count_weekdays(d(2024, 3, 9), d(2024, 3, 10)), 2);
        assert_eq!(count_weekdays(d(2024, 3, 9), d(2024, 3, 9)), 1);
    }

    #[test]
    fn single_weekday_after_weekend_pays_one() {
        assert_eq!(count_weekdays(d(2024, 3, 9), d(2024, 3, 11)), 1);
    }

    #[test]
    fn weekdays_ignore_weekend_days_in_between() {
        // Thursday to Tuesday: Thu, Fri, Mon, Tue.
        assert_eq!(count_weekdays(d(2024, 3, 7), d(2024, 3, 12)), 4);
    }

    #[test]
    fn empty_or_inverted_range_floors_at_one() {
        assert_eq!(count_weekdays(d(2024, 3, 8), d(2024, 3, 4)), 1);
        assert_eq!(count_weekdays(d(2024, 3, 5), d(2024, 3, 5)), 1);
    }

    #[test]
    fn windows_count_days_differently() {
        let start = d(2024, 3, 4);
        let end = d(2024, 3, 9);
        assert_eq!(DateWindow::exclusive(start, end).num_of_days, 5);
        assert_eq!(DateWindow::inclusive(start, end).num_of_days, 6);
        assert_eq!(DateWindow::single_day(start).num_of_days, 1);
    }

    #[test]
    fn travel_and_return_dates_bracket_the_trip() {
        assert_eq!(travel_date(d(2024, 3, 1)), Some(d(2024, 2, 29)));
        assert_eq!(return_date(d(2024, 12, 31)), Some(d(2025, 1, 1)));
    }
}
