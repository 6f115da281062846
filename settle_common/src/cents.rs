use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "BRL";

//--------------------------------------       Cents        ---------------------------------------------------------
/// A monetary amount in the smallest currency unit (centavos).
///
/// All money in the engine is integer arithmetic on this type. Conversion to a decimal representation only happens at
/// the edges (gateway requests and human-readable output).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct CentsConversionError(String);

impl FromStr for Cents {
    type Err = CentsConversionError;

    /// Parses decimal strings such as `15`, `15.5`, `15.50` or `15,50`. At most two fractional digits are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut parts = digits.splitn(2, ['.', ',']);
        let whole = parts
            .next()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| CentsConversionError(format!("'{s}' has no whole part")))?
            .parse::<i64>()
            .map_err(|e| CentsConversionError(format!("'{s}' is not a valid amount. {e}")))?;
        let fraction = match parts.next() {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 2 || !f.chars().all(|c| c.is_ascii_digit()) => {
                return Err(CentsConversionError(format!("'{s}' must have one or two decimal places")));
            },
            Some(f) if f.len() == 1 => f.parse::<i64>().map(|v| v * 10).unwrap_or_default(),
            Some(f) => f.parse::<i64>().unwrap_or_default(),
        };
        let value = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(|| CentsConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}R${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_reais(reais: i64) -> Self {
        Self(reais * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The amount as a decimal number of currency units. Only use this when talking to external APIs that insist on
    /// floating point amounts.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Converts a decimal amount from an external API into cents, rounding to the nearest cent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_decimal(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_amounts() {
        assert_eq!("15".parse::<Cents>().unwrap(), Cents::from(1500));
        assert_eq!("15.5".parse::<Cents>().unwrap(), Cents::from(1550));
        assert_eq!("15.05".parse::<Cents>().unwrap(), Cents::from(1505));
        assert_eq!("15,50".parse::<Cents>().unwrap(), Cents::from(1550));
        assert_eq!("-2.00".parse::<Cents>().unwrap(), Cents::from(-200));
        assert!("15.005".parse::<Cents>().is_err());
        assert!(".50".parse::<Cents>().is_err());
        assert!("abc".parse::<Cents>().is_err());
        assert!("1.x".parse::<Cents>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Cents::from(12_345).to_string(), "R$123.45");
        assert_eq!(Cents::from(5).to_string(), "R$0.05");
        assert_eq!(Cents::from(-1500).to_string(), "-R$15.00");
    }

    #[test]
    fn arithmetic() {
        let mut a = Cents::from_reais(100);
        a -= Cents::from(2_000);
        assert_eq!(a, Cents::from(8_000));
        a += Cents::from(1);
        assert_eq!(a + Cents::from(-1), Cents::from(8_000));
        assert_eq!(-a, Cents::from(-8_001));
        let total: Cents = vec![Cents::from(1), Cents::from(2), Cents::from(3)].into_iter().sum();
        assert_eq!(total, Cents::from(6));
        assert_eq!(Cents::from(7) * 3, Cents::from(21));
    }

    #[test]
    fn decimal_edges() {
        assert_eq!(Cents::from_decimal(115.0), Cents::from(11_500));
        assert_eq!(Cents::from_decimal(0.1 + 0.2), Cents::from(30));
        assert!((Cents::from(11_550).as_decimal() - 115.5).abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_as_integer_cents() {
        let json = serde_json::to_string(&Cents::from(1999)).unwrap();
        assert_eq!(json, "1999");
    }
}
