use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed on-disk format for timestamp cursors: UTC, second precision.
pub const CURSOR_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Synchronization position of one dataset.
///
/// Persisted as a plain string. A string in [`CURSOR_TIMESTAMP_FORMAT`] is read
/// back as a timestamp cursor, anything else as an identifier cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cursor {
    /// Last identifier appended for an identifier-ordered dataset.
    Identifier(String),

    /// Last freshness marker acted on for a full-replace dataset.
    Timestamp(DateTime<Utc>),
}

impl Cursor {
    /// Builds a timestamp cursor, dropping sub-second precision.
    pub fn timestamp(ts: DateTime<Utc>) -> Self {
        Cursor::Timestamp(ts.trunc_subsecs(0))
    }

    pub fn identifier(id: impl Into<String>) -> Self {
        Cursor::Identifier(id.into())
    }

    /// Parses a timestamp in the fixed cursor format.
    pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(s.trim(), CURSOR_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Reads a value from a legacy snapshot file, which stored full RFC 3339
    /// timestamps (any offset, nanoseconds) rather than the fixed format.
    pub fn from_legacy(s: &str) -> Self {
        if let Some(ts) = Self::parse_timestamp(s) {
            return Cursor::Timestamp(ts);
        }
        match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(ts) => Cursor::timestamp(ts.with_timezone(&Utc)),
            Err(_) => Cursor::Identifier(s.to_string()),
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Cursor::Identifier(id) => Some(id),
            Cursor::Timestamp(_) => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cursor::Timestamp(ts) => Some(*ts),
            Cursor::Identifier(_) => None,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Identifier(id) => f.write_str(id),
            Cursor::Timestamp(ts) => write!(f, "{}", ts.format(CURSOR_TIMESTAMP_FORMAT)),
        }
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        match Self::parse_timestamp(&s) {
            Some(ts) => Cursor::Timestamp(ts),
            None => Cursor::Identifier(s),
        }
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_uses_fixed_second_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let cursor = Cursor::timestamp(ts);
        assert_eq!(cursor.to_string(), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn string_form_round_trips_both_kinds() {
        let id = Cursor::from("000000000000000000000003".to_string());
        assert_eq!(id, Cursor::identifier("000000000000000000000003"));

        let ts = Cursor::from("2024-01-02T03:04:05Z".to_string());
        assert_eq!(
            ts.as_timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn json_encodes_as_plain_string() {
        let json = serde_json::to_string(&Cursor::identifier("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }

    #[test]
    fn legacy_rfc3339_is_normalized() {
        let cursor = Cursor::from_legacy("2024-01-02T05:04:05.123456789+02:00");
        assert_eq!(cursor.to_string(), "2024-01-02T03:04:05Z");
    }
}
