// src/slots/datetime.rs — Date/time normalization
//
// Source payloads have used ISO dates, slash dates, compact digits,
// Japanese era-free dates, 12-hour clocks and combined timestamps. All of
// them funnel into NaiveDate / NaiveTime (minute resolution) here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%Y.%m.%d"];

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p", "%I:%M:%S %p"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Offset-carrying forms that are not strict RFC 3339.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%:z"];

/// Parse any accepted date (or combined date-time) representation.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(d) = parse_compact_date(s) {
        return Some(d);
    }
    if let Some(d) = parse_japanese_date(s) {
        return Some(d);
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    parse_datetime(s).map(|dt| dt.date())
}

/// Parse any accepted time-of-day (or combined date-time) representation.
/// Seconds and sub-seconds are dropped.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let parsed = parse_compact_time(s)
        .or_else(|| {
            let upper = s.to_ascii_uppercase();
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
        })
        .or_else(|| parse_datetime(s).map(|dt| dt.time()))?;

    to_minute(parsed)
}

/// Parse a combined date-time. Offsets are honoured by keeping the wall
/// clock of the source offset: a slot at 18:00+09:00 is an 18:00 slot.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Whether a grouped-payload key names a date.
pub fn looks_like_date(key: &str) -> bool {
    parse_date(key).is_some()
}

/// `YYYYMMDD`
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY年M月D日`
fn parse_japanese_date(s: &str) -> Option<NaiveDate> {
    let (year, rest) = s.split_once('年')?;
    let (month, rest) = rest.split_once('月')?;
    let day = rest.strip_suffix('日').unwrap_or(rest);
    NaiveDate::from_ymd_opt(
        year.trim().parse().ok()?,
        month.trim().parse().ok()?,
        day.trim().parse().ok()?,
    )
}

/// `HHMM` / `HMM`
fn parse_compact_time(s: &str) -> Option<NaiveTime> {
    if !(3..=4).contains(&s.len()) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let split = s.len() - 2;
    let hour: u32 = s[..split].parse().ok()?;
    let minute: u32 = s[split..].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn to_minute(t: NaiveTime) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> String {
        parse_date(s)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "NONE".into())
    }

    fn time(s: &str) -> String {
        parse_time(s)
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "NONE".into())
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(date("2026-02-15"), "2026-02-15");
        assert_eq!(date("2026/02/15"), "2026-02-15");
        assert_eq!(date("2026/2/5"), "2026-02-05");
        assert_eq!(date("20260215"), "2026-02-15");
        assert_eq!(date("15-02-2026"), "2026-02-15");
        assert_eq!(date("15/02/2026"), "2026-02-15");
        assert_eq!(date("2026年2月15日"), "2026-02-15");
        assert_eq!(date("  2026-02-15  "), "2026-02-15");
    }

    #[test]
    fn test_date_from_combined() {
        assert_eq!(date("2026-02-15T19:00:00"), "2026-02-15");
        assert_eq!(date("2026-02-15T19:00:00+09:00"), "2026-02-15");
        assert_eq!(date("2026-02-15 19:00"), "2026-02-15");
    }

    #[test]
    fn test_date_rejects_garbage() {
        assert_eq!(date(""), "NONE");
        assert_eq!(date("status"), "NONE");
        assert_eq!(date("2026-13-40"), "NONE");
        assert_eq!(date("20261340"), "NONE");
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(time("19:00"), "19:00");
        assert_eq!(time("9:05"), "09:05");
        assert_eq!(time("19:00:00"), "19:00");
        assert_eq!(time("19:00:59"), "19:00");
        assert_eq!(time("1900"), "19:00");
        assert_eq!(time("930"), "09:30");
        assert_eq!(time("7:00 PM"), "19:00");
        assert_eq!(time("7:00 pm"), "19:00");
        assert_eq!(time("7:30AM"), "07:30");
        assert_eq!(time("12:00 AM"), "00:00");
    }

    #[test]
    fn test_time_from_combined() {
        assert_eq!(time("2026-02-15T19:00:00"), "19:00");
        assert_eq!(time("2026-02-15T19:00:00.123Z"), "19:00");
        assert_eq!(time("2026-02-15T19:00+09:00"), "19:00");
        assert_eq!(time("2026/02/15 18:30"), "18:30");
    }

    #[test]
    fn test_time_rejects_garbage() {
        assert_eq!(time(""), "NONE");
        assert_eq!(time("dinner"), "NONE");
        assert_eq!(time("25:00"), "NONE");
        assert_eq!(time("2460"), "NONE");
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(date("2026/02/15"), "2026-02-15");
            assert_eq!(time("7:00 PM"), "19:00");
        }
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("2024-06-01"));
        assert!(looks_like_date("2024/06/01"));
        assert!(!looks_like_date("status"));
        assert!(!looks_like_date("data"));
        assert!(!looks_like_date("meta"));
    }
}
