//! Timestamp and identifier helpers.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// UTC timestamp type used across the crate.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Converts backend epoch milliseconds into a timestamp.
///
/// Returns `None` for absent or out-of-range values.
#[must_use]
pub fn timestamp_from_millis(millis: Option<i64>) -> Option<Timestamp> {
    millis.and_then(|m| Utc.timestamp_millis_opt(m).single())
}

/// Generates a short run-scoped identifier (first segment of a v4 UUID).
#[must_use]
pub fn short_run_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_timestamp_from_millis() {
        let ts = timestamp_from_millis(Some(1_700_000_000_000)).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
        assert!(timestamp_from_millis(None).is_none());
    }

    #[test]
    fn test_short_run_id_length() {
        let id = short_run_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
