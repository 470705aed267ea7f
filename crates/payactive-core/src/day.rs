//! Target-day parsing and day windows
//!
//! All day arithmetic is UTC.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::PipelineError;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
        .map_err(|_| PipelineError::InvalidDay(s.to_string()))
}

/// The calendar day before `now`.
pub fn yesterday_of(now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(1)).date_naive()
}

pub fn yesterday() -> NaiveDate {
    yesterday_of(Utc::now())
}

/// One calendar day and its UTC start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
}

impl DayWindow {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            start: day.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Object-store partition for this day: `YYYY/MM/DD`.
    pub fn partition(&self) -> String {
        self.day.format("%Y/%m/%d").to_string()
    }

    /// Start-of-day instant as RFC 3339, used as the output document timestamp.
    pub fn timestamp(&self) -> String {
        self.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    pub fn label(&self) -> String {
        self.day.format(DAY_FORMAT).to_string()
    }
}
