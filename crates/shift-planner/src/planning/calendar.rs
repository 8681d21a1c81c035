use chrono::{Datelike, NaiveDate, Weekday};

/// Longest inclusive date range a submission or a planning view may cover.
pub const MAX_RANGE_DAYS: u32 = 366;

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Inclusive list of dates between `start` and `end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Dates a request range expands to: a single day is kept as-is, longer ranges skip weekends.
pub fn requested_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start == end {
        return vec![start];
    }
    days_between(start, end)
        .into_iter()
        .filter(|day| !is_weekend(*day))
        .collect()
}

/// Inclusive day count of a date range, zero when reversed.
pub fn range_length(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    ((end - start).num_days() + 1) as u32
}
