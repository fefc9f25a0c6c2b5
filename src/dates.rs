//! Defensive date parsing for feed dialects.
//!
//! Feeds disagree on date formats: RSS 2.0 uses RFC 2822, Atom uses RFC 3339,
//! RDF feeds carry W3C-DTF in `dc:date`, and plenty of feeds emit something
//! else entirely. [`parse_date`] tries each known shape in turn and falls back
//! to "now", so an unparseable date only ranks an entry as most recent and
//! never drops it.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Formats carrying an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Formats without an offset, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y"];

/// Parse a feed date, returning `None` if no known format matches.
pub fn try_parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // "Z" suffix with fractional or missing seconds that RFC 3339 rejects.
    let zulu = s.strip_suffix('Z').map(|rest| format!("{rest}+0000"));
    let candidate = zulu.as_deref().unwrap_or(s);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Parse a feed date, falling back to the current time.
///
/// Never fails and never leaves the timestamp unset.
pub fn parse_date(raw: Option<&str>) -> DateTime<Utc> {
    match raw.and_then(try_parse_date) {
        Some(dt) => dt,
        None => {
            debug!(raw = ?raw, "Unparseable feed date; using now");
            Utc::now()
        }
    }
}

/// Local display form, e.g. `2025/05/06 14:30`.
pub fn display_date(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y/%m/%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(
            try_parse_date("Tue, 06 May 2025 14:30:00 GMT"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
        assert_eq!(
            try_parse_date("Tue, 06 May 2025 23:30:00 +0900"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
    }

    #[test]
    fn test_rfc3339_and_w3cdtf() {
        assert_eq!(
            try_parse_date("2025-05-06T14:30:00Z"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
        assert_eq!(
            try_parse_date("2025-05-06T23:30:00+09:00"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
        assert_eq!(
            try_parse_date("2025-05-06T14:30Z"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
    }

    #[test]
    fn test_naive_and_date_only() {
        assert_eq!(
            try_parse_date("2025-05-06 14:30:00"),
            Some(utc(2025, 5, 6, 14, 30, 0))
        );
        assert_eq!(try_parse_date("2025/05/06 14:30"), Some(utc(2025, 5, 6, 14, 30, 0)));
        assert_eq!(try_parse_date("2025-05-06"), Some(utc(2025, 5, 6, 0, 0, 0)));
    }

    #[test]
    fn test_unparseable_date_is_now() {
        let before = Utc::now().timestamp();
        let parsed = parse_date(Some("sometime last week")).timestamp();
        let after = Utc::now().timestamp();
        assert!(parsed >= before && parsed <= after + 1);
    }

    #[test]
    fn test_missing_date_is_now() {
        let now = Utc::now().timestamp();
        assert!((parse_date(None).timestamp() - now).abs() <= 2);
        assert!((parse_date(Some("   ")).timestamp() - now).abs() <= 2);
    }
}
