use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TRACKING_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Z0-9-]{6,40}$").unwrap()
});

/// Trims and upper-cases a carrier tracking code. Returns `None` for empty or malformed codes.
pub fn normalize_tracking_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    TRACKING_CODE_RE.is_match(&code).then_some(code)
}

/// Midnight UTC on the first day of the month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}
