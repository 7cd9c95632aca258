//! Small shared helpers: timestamps, text truncation, id generation.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant the way every table stores it.
///
/// Fixed width with a `Z` suffix, so string comparison in SQL orders correctly.
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Parse a stored timestamp back into UTC. `None` for anything unparseable.
pub fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fresh random row id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Truncate to at most `max` bytes on a char boundary, appending `...` when cut.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
