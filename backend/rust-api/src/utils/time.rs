use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parses store timestamps: RFC 3339, or naive `timestamp` columns taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Unparseable or missing timestamps become `None` instead of rejecting the row.
pub fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(raw)) => parse_timestamp(&raw),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_timestamp("2024-05-01T10:00:00.123456+02:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2024-05-01T08:00:00.123456+00:00");

        let naive = parse_timestamp("2024-05-01 10:00:00").unwrap();
        assert_eq!(naive.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
