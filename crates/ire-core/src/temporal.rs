//! # Temporal Helpers — UTC Normalisation
//!
//! Events arrive with ISO-8601 timestamps from several collaborators, some
//! with explicit offsets and some without. Everything inside the engine is
//! `DateTime<Utc>`, truncated to whole seconds so that due-time arithmetic
//! and serialized output are stable.
//!
//! - RFC 3339 strings with any offset are accepted and converted to UTC.
//! - Strings without an offset (`2025-10-07T14:00:00`) are read as UTC.
//! - Output is always `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::error::IngestError;

/// Parse an ISO-8601 timestamp into UTC, truncated to seconds.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, IngestError> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(truncate_to_seconds(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| truncate_to_seconds(naive.and_utc()))
        .map_err(|e| IngestError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })
}

/// Render a timestamp as ISO-8601 with a `Z` suffix and no sub-seconds.
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Truncate a `DateTime<Utc>` to seconds precision.
pub fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
