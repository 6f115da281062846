use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::db_types::OrderNumber;

static ORDER_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^AP\d{4}(0[1-9]|1[0-2])\d{4}$").unwrap()
});

/// Generates an order number for the month of `now` with a random four-digit suffix.
///
/// There are only 10,000 numbers per month, so callers must handle collisions by asking for another number.
pub fn new_order_number(now: DateTime<Utc>) -> OrderNumber {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    OrderNumber(format!("AP{:04}{:02}{suffix:04}", now.year(), now.month()))
}

pub fn is_valid_order_number(s: &str) -> bool {
    ORDER_NUMBER_RE.is_match(s)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        for _ in 0..100 {
            let number = new_order_number(now);
            assert!(number.as_str().starts_with("AP202503"), "{number}");
            assert_eq!(number.as_str().len(), 12);
            assert!(is_valid_order_number(number.as_str()));
        }
    }

    #[test]
    fn validation() {
        assert!(is_valid_order_number("AP2024120042"));
        assert!(!is_valid_order_number("AP2024130042"));
        assert!(!is_valid_order_number("AP202412042"));
        assert!(!is_valid_order_number("XX2024120042"));
    }
}
