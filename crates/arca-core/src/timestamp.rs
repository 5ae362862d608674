use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::InvalidFilter;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a timestamp in any of the textual forms the bridge writes.
/// Values without an offset are taken as UTC.
pub fn parse_stored_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a caller-supplied ISO-8601 date bound (`after` / `before`).
pub fn parse_date_bound(field: &'static str, value: &str) -> Result<DateTime<Utc>, InvalidFilter> {
    parse_stored_timestamp(value).ok_or_else(|| InvalidFilter::new(field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_bridge_format_with_offset() {
        assert_eq!(
            parse_stored_timestamp("2024-05-01 12:00:00+02:00"),
            Some(utc(2024, 5, 1, 10, 0, 0))
        );
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(
            parse_stored_timestamp("2024-05-01T10:00:00Z"),
            Some(utc(2024, 5, 1, 10, 0, 0))
        );
    }

    #[test]
    fn parses_naive_as_utc() {
        assert_eq!(
            parse_stored_timestamp("2024-05-01T10:00:00"),
            Some(utc(2024, 5, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_stored_timestamp("2024-05-01 10:00:00.250")
                .map(|dt| dt.timestamp_millis() % 1000),
            Some(250)
        );
    }

    #[test]
    fn parses_date_only_as_midnight() {
        assert_eq!(
            parse_stored_timestamp("2024-05-01"),
            Some(utc(2024, 5, 1, 0, 0, 0))
        );
    }

    #[test]
    fn bad_bound_names_field_and_value() {
        let err = parse_date_bound("after", "yesterday").unwrap_err();
        assert_eq!(err.field, "after");
        assert_eq!(err.value, "yesterday");
    }
}
