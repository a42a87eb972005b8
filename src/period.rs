//! Calendar ranges used by fetch, summary and trend operations. All dates are UTC.

use chrono::{Datelike, Duration, NaiveDate, Utc};

/// Half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Inclusive last day, as used by store filters and provider time periods.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn next_month_start(date: NaiveDate) -> NaiveDate {
    if date.month() == 12 {
        first_of_month(date.year() + 1, 1)
    } else {
        first_of_month(date.year(), date.month() + 1)
    }
}

fn previous_month_start(date: NaiveDate) -> NaiveDate {
    if date.month() == 1 {
        first_of_month(date.year() - 1, 12)
    } else {
        first_of_month(date.year(), date.month() - 1)
    }
}

/// From the 1st of `today`'s month through the 1st of the following month.
pub fn current_month_range(today: NaiveDate) -> DateRange {
    let start = first_of_month(today.year(), today.month());
    DateRange {
        start,
        end: next_month_start(start),
    }
}

pub fn previous_month_range(today: NaiveDate) -> DateRange {
    let current = current_month_range(today);
    DateRange {
        start: previous_month_start(current.start),
        end: current.start,
    }
}

pub fn next_month_range(today: NaiveDate) -> DateRange {
    let current = current_month_range(today);
    DateRange {
        start: current.end,
        end: next_month_start(current.end),
    }
}

/// The `months` calendar months ending with `today`'s month.
pub fn trailing_months(today: NaiveDate, months: u32) -> DateRange {
    let current = current_month_range(today);
    let mut start = current.start;
    for _ in 1..months.max(1) {
        start = previous_month_start(start);
    }
    DateRange {
        start,
        end: current.end,
    }
}

/// `[today - days, today]` as a half-open range, clamped to the representable calendar.
pub fn last_n_days(today: NaiveDate, days: u32) -> DateRange {
    DateRange {
        start: today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN),
        end: today.succ_opt().unwrap_or(NaiveDate::MAX),
    }
}
