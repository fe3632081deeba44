//! Shared row-decoding helpers.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a stored timestamp.
///
/// The writers in this crate always store RFC3339, but rows touched by
/// SQLite's own `datetime('now')` or by hand lack the offset, so the
/// bare formats are accepted too and read as UTC.
///
/// # Examples
/// ```
/// use dossier::infrastructure::database::utils::parse_datetime;
///
/// let a = parse_datetime("2026-08-25T09:30:00Z").unwrap();
/// let b = parse_datetime("2026-08-25 09:30:00").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc3339_err) => ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map_or(Err(rfc3339_err), |naive| {
                Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            }),
    }
}
