//! Timestamp rendering helpers.
//!
//! Timestamps travel as milliseconds since the Unix epoch by default. The
//! RFC 3339 pair is offered for converters that prefer a readable form.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Render a timestamp as its integer millisecond count.
pub fn format_millis(ts: &DateTime<Utc>) -> String {
    ts.timestamp_millis().to_string()
}

/// Parse an integer millisecond count.
pub fn parse_millis(s: &str) -> Result<DateTime<Utc>, String> {
    let millis = s
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("not a millisecond count: {}", e))?;
    from_millis(millis).ok_or_else(|| format!("{} ms is out of range", millis))
}

pub fn format_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

/// Instant `millis` milliseconds after the epoch, if representable.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round_trip() {
        let ts = from_millis(1_700_000_000_123).expect("timestamp should be in range");
        assert_eq!(format_millis(&ts), "1700000000123");
        assert_eq!(parse_millis("1700000000123"), Ok(ts));
    }

    #[test]
    fn test_parse_millis_rejects_garbage() {
        assert!(parse_millis("yesterday").is_err());
        assert!(parse_millis("").is_err());
    }

    #[test]
    fn test_rfc3339_round_trip() {
        let ts = from_millis(86_400_000).expect("timestamp should be in range");
        let text = format_rfc3339(&ts);
        assert_eq!(text, "1970-01-02T00:00:00.000Z");
        assert_eq!(parse_rfc3339(&text), Ok(ts));
        assert!(parse_rfc3339("1970-01-02").is_err());
    }
}
