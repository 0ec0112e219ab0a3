//! Calendar windows for selective harvesting
//!
//! A harvest covers an inclusive range of days. The range is walked in
//! month- or day-sized sub-windows so that a crash never loses more than one
//! window of progress, and the `from`/`until` request parameters are
//! rendered in whichever granularity the repository advertises.

use chrono::{Datelike, NaiveDate};

/// Inclusive range of calendar days with `begin <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// First day covered by this window
    pub begin: NaiveDate,
    /// Last day covered by this window
    pub end: NaiveDate,
}

impl Interval {
    /// Create a window from its inclusive bounds.
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
        Self { begin, end }
    }

    /// Split into calendar-month windows, clipped to the outer bounds.
    ///
    /// The result is strictly increasing, non-overlapping, and covers the
    /// window without gaps. An inverted window yields nothing.
    pub fn monthly(&self) -> Vec<Interval> {
        let mut windows = Vec::new();
        let mut cursor = self.begin;
        while cursor <= self.end {
            let end = end_of_month(cursor).min(self.end);
            windows.push(Interval { begin: cursor, end });
            match end.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        windows
    }

    /// Split into single-day windows.
    pub fn daily(&self) -> Vec<Interval> {
        let mut windows = Vec::new();
        let mut cursor = self.begin;
        while cursor <= self.end {
            windows.push(Interval {
                begin: cursor,
                end: cursor,
            });
            match cursor.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        windows
    }
}

/// Last day of the month the given date falls in.
fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    // SAFETY: month is 1-12 and day 1 is valid in every month; the first of
    // a month always has a predecessor.
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("valid month 1-12, day 1")
        .pred_opt()
        .expect("first of a month has a predecessor")
}

/// Date resolution a repository advertises for selective harvesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Day-level filters, `YYYY-MM-DD` on the wire
    Day,
    /// Second-level filters, `YYYY-MM-DDThh:mm:ssZ` on the wire
    Second,
}

impl Granularity {
    /// Parse the granularity string from an Identify response.
    pub fn from_advertised(value: &str) -> Option<Self> {
        match value {
            "YYYY-MM-DD" => Some(Granularity::Day),
            "YYYY-MM-DDThh:mm:ssZ" => Some(Granularity::Second),
            _ => None,
        }
    }

    /// Render a window's left boundary as a `from` parameter.
    pub fn format_from(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Second => format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
        }
    }

    /// Render a window's right boundary as an `until` parameter.
    pub fn format_until(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Second => format!("{}T23:59:59Z", date.format("%Y-%m-%d")),
        }
    }
}
