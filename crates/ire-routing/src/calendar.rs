//! # Business Calendar
//!
//! Resolves `next_business_day` timing. The default [`WeekdayCalendar`]
//! treats Monday to Friday as business days at a single fixed UTC offset and
//! opens at 09:00 local time. There is no holiday list; a deployment that
//! needs one supplies its own [`BusinessCalendar`].

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc, Weekday,
};
use thiserror::Error;

/// Why a business-day resolution failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// The calendar collaborator could not be consulted.
    #[error("calendar unavailable: {0}")]
    Unavailable(String),

    /// The result fell outside the representable date range.
    #[error("date out of range resolving business day after {0}")]
    OutOfRange(String),

    /// A UTC offset string could not be parsed.
    #[error("invalid utc offset {0:?}: expected +HH:MM, -HH:MM or Z")]
    InvalidOffset(String),
}

/// Source of business-day due times.
pub trait BusinessCalendar: Send + Sync {
    /// The opening time of the first business day strictly after `ts`.
    fn next_business_day_at(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, CalendarError>;
}

/// Monday–Friday calendar at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayCalendar {
    utc_offset: FixedOffset,
    opening_time: NaiveTime,
}

impl WeekdayCalendar {
    pub fn new(utc_offset: FixedOffset, opening_time: NaiveTime) -> Self {
        Self {
            utc_offset,
            opening_time,
        }
    }

    /// Calendar opening at 09:00 local time at `utc_offset`.
    pub fn with_offset(utc_offset: FixedOffset) -> Self {
        Self::new(utc_offset, NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }
}

impl Default for WeekdayCalendar {
    fn default() -> Self {
        Self::with_offset(Utc.fix())
    }
}

impl BusinessCalendar for WeekdayCalendar {
    fn next_business_day_at(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, CalendarError> {
        let out_of_range = || CalendarError::OutOfRange(ts.to_rfc3339());
        let mut day = ts.with_timezone(&self.utc_offset).date_naive();
        loop {
            day = day.succ_opt().ok_or_else(out_of_range)?;
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                break;
            }
        }
        let local = day.and_time(self.opening_time);
        self.utc_offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(out_of_range)
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM`, `Z` or `UTC` into a fixed offset.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, CalendarError> {
    let invalid = || CalendarError::InvalidOffset(s.to_string());
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Fallback due time used when the calendar fails.
pub fn degraded_due(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts + Duration::hours(24)
}
