//! Utility functions for timestamps and log-friendly text.

pub mod timestamps;

pub use timestamps::{
    format_timestamp, iso_timestamp, now_utc, parse_run_date, today_utc, Timestamp, TimestampError,
};

/// Truncates `text` to at most `max_chars` characters, on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
