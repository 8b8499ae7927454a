//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert fractional unix seconds (as sent by acarsdec) to a UTC timestamp
///
/// Returns `None` for values chrono cannot represent.
pub fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

/// Fixed-width RFC3339 text used for store columns
///
/// Microsecond precision with a `Z` suffix keeps lexicographic order equal to
/// chronological order, which the history scans rely on.
pub fn db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC3339 column value back into a UTC timestamp
pub fn parse_rfc3339(value: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_from_unix_seconds_keeps_fraction() {
        let ts = from_unix_seconds(1_700_000_000.25).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_from_unix_seconds_rejects_nan() {
        assert!(from_unix_seconds(f64::NAN).is_none());
    }

    #[test]
    fn test_parse_rfc3339_roundtrip() {
        let ts = now();
        let parsed = parse_rfc3339(&ts.to_rfc3339()).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_db_timestamp_is_fixed_width() {
        let a = db_timestamp(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let b = db_timestamp(Utc.timestamp_opt(1_700_000_000, 120_000_000).unwrap());
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_parse_rfc3339_invalid() {
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
