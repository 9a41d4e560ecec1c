//! Timestamp helpers for run logs and summaries.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during date parsing.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The date string is empty.
    #[error("Empty date string")]
    EmptyString,

    /// The date value is invalid.
    #[error("Invalid date: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use topicflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns today's date in UTC, the date a run's filenames are derived from.
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Formats a timestamp as RFC 3339 with millisecond precision and a `Z` suffix.
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a `YYYY-MM-DD` run date.
pub fn parse_run_date(input: &str) -> Result<NaiveDate, TimestampError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|e| TimestampError::InvalidFormat(format!("{trimmed}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-06-01T02:00:05.000Z");
    }

    #[test]
    fn test_parse_run_date() {
        let date = parse_run_date(" 2024-06-01 ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_parse_run_date_errors() {
        assert!(matches!(parse_run_date(""), Err(TimestampError::EmptyString)));
        assert!(matches!(
            parse_run_date("06/01/2024"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }
}
