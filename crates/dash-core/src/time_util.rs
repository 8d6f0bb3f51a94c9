//! Time utilities.
//!
//! All timestamps are milliseconds since the Unix epoch and every calendar
//! computation (day buckets, display strings) is done in UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[inline]
fn to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Dashboard display time: day and month without padding, 24h clock
/// (`"7.3. 09:05"`).
pub fn display_time(ms: i64) -> String {
    let t = to_utc(ms);
    format!("{}.{}. {:02}:{:02}", t.day(), t.month(), t.hour(), t.minute())
}

/// Calendar date of `ms` as `YYYY-MM-DD`.
pub fn utc_date(ms: i64) -> String {
    to_utc(ms).format("%Y-%m-%d").to_string()
}

/// Short weekday label (`Mon` .. `Sun`) of a `YYYY-MM-DD` date.
pub fn weekday_label(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%a").to_string())
        .unwrap_or_default()
}

/// Midnight (UTC) of the day containing `ms`.
pub fn start_of_day_ms(ms: i64) -> i64 {
    ms - ms.rem_euclid(DAY_MS)
}

/// Midnight (UTC) `days` days before the day containing `now_ms`.
pub fn days_back_midnight(now_ms: i64, days: i64) -> i64 {
    start_of_day_ms(now_ms) - days * DAY_MS
}

/// `YYYY-MM-DD` dates of the `days` trailing days ending today, oldest first.
pub fn trailing_dates(now_ms: i64, days: i64) -> Vec<String> {
    let today = to_utc(now_ms).date_naive();
    (0..days)
        .rev()
        .map(|i| (today - Duration::days(i)).format("%Y-%m-%d").to_string())
        .collect()
}

/// RFC 3339 string of `ms` (storage timestamps).
pub fn rfc3339(ms: i64) -> String {
    to_utc(ms).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp (as returned by the database) into ms.
pub fn parse_rfc3339_ms(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp_millis())
}

/// Format an integer with `,` thousands separators (`1234567` → `"1,234,567"`).
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-07T09:05:00Z (Thursday)
    const T: i64 = 1_709_802_300_000;

    #[test]
    fn display_formats() {
        assert_eq!(display_time(T), "7.3. 09:05");
        assert_eq!(utc_date(T), "2024-03-07");
        assert_eq!(weekday_label("2024-03-07"), "Thu");
        assert_eq!(weekday_label("garbage"), "");
    }

    #[test]
    fn day_arithmetic() {
        let midnight = start_of_day_ms(T);
        assert_eq!(utc_date(midnight), "2024-03-07");
        assert_eq!(T - midnight, (9 * 60 + 5) * 60_000);
        assert_eq!(days_back_midnight(T, 7), midnight - 7 * DAY_MS);
    }

    #[test]
    fn trailing_dates_are_dense_and_ascending() {
        let dates = trailing_dates(T, 3);
        assert_eq!(dates, vec!["2024-03-05", "2024-03-06", "2024-03-07"]);
        assert_eq!(trailing_dates(T, 1), vec!["2024-03-07"]);
    }

    #[test]
    fn rfc3339_round_trip() {
        let s = rfc3339(T + 1);
        assert_eq!(s, "2024-03-07T09:05:00.001Z");
        assert_eq!(parse_rfc3339_ms(&s), Some(T + 1));
        assert_eq!(parse_rfc3339_ms("2024-03-07T09:05:00+00:00"), Some(T));
    }

    #[test]
    fn thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
