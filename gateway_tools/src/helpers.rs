use settle_common::Cents;

use crate::GatewayApiError;

/// Strips everything but ASCII digits. CPFs and zip codes are sent this way.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// The shipping aggregator sends prices as decimal strings, e.g. `"21.90"`.
pub fn parse_decimal_amount(price: &str) -> Result<Cents, GatewayApiError> {
    price.parse::<Cents>().map_err(|e| GatewayApiError::InvalidCurrencyAmount(format!("{price}. {e}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digits() {
        assert_eq!(digits_only("123.456.789-09"), "12345678909");
        assert_eq!(digits_only("01304-001"), "01304001");
        assert_eq!(digits_only(""), "");
    }

    #[test]
    fn decimal_amounts() {
        assert_eq!(parse_decimal_amount("21.90").unwrap(), Cents::from(2_190));
        assert_eq!(parse_decimal_amount("38").unwrap(), Cents::from(3_800));
        assert!(matches!(parse_decimal_amount("R$ 10"), Err(GatewayApiError::InvalidCurrencyAmount(_))));
    }
}
