//! Timestamp formatting shared by wire payloads.

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp the way browser clients produce them with
/// `Date.prototype.toISOString()`: millisecond precision, `Z` suffix.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time in [`iso_millis`] form.
pub fn now_iso() -> String {
    iso_millis(Utc::now())
}
