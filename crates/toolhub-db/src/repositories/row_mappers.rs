//! Row mapping helpers shared by the `SQLite` repositories.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Format a timestamp for storage.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 (written by this crate) and `SQLite`'s
/// `YYYY-MM-DD HH:MM:SS` (written by `datetime('now')`).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s.trim_end_matches(" UTC"), "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .ok()
}

/// Parse a required timestamp, falling back to now for corrupt rows.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    parse_datetime(s).unwrap_or_else(|| {
        tracing::warn!(value = %s, "Unparseable timestamp in database");
        Utc::now()
    })
}

/// Encode an environment variable value to base64.
pub fn encode_env_value(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Decode a base64-encoded environment variable value.
pub fn decode_env_value(encoded: &str) -> Result<String, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| format!("Failed to decode env var: {e}"))?;

    String::from_utf8(bytes).map_err(|e| format!("Invalid UTF-8 in env var: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_formats() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(now)).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());

        let sqlite = parse_datetime("2025-01-02 03:04:05").unwrap();
        assert_eq!(sqlite.to_rfc3339(), "2025-01-02T03:04:05+00:00");

        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn test_env_encoding() {
        let encoded = encode_env_value("s3cr=t");
        assert_ne!(encoded, "s3cr=t");
        assert_eq!(decode_env_value(&encoded).unwrap(), "s3cr=t");
        assert!(decode_env_value("%%%").is_err());
    }
}
