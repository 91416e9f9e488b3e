//! Business-day arithmetic on a Monday–Friday calendar.
//!
//! Exchange holidays are not modelled: every weekday counts as a trading day.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The last business day strictly before `date`.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date - Duration::days(1);
    while !is_business_day(d) {
        d -= Duration::days(1);
    }
    d
}

/// The first business day strictly after `date`.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date + Duration::days(1);
    while !is_business_day(d) {
        d += Duration::days(1);
    }
    d
}

/// Start of the span of `n` business days ending at `end`.
///
/// `end` must be a business day; for `n == 1` the result is `end` itself.
/// `n == 0` is treated as 1.
pub fn business_days_back(end: NaiveDate, n: usize) -> NaiveDate {
    let mut start = end;
    for _ in 1..n {
        start = previous_business_day(start);
    }
    start
}

/// Number of business days in `[start, end]`. Zero when `start > end`.
pub fn count_business_days(start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .count()
}

/// All business days in `[start, end]`, ascending.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}
