use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::Cents;

const BPS_SCALE: i128 = 10_000;

/// A rate expressed in basis points (1/100th of a percent). 2000 bps is 20%.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct BasisPoints(i64);

impl From<i64> for BasisPoints {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, (self.0 % 100).abs())
    }
}

impl BasisPoints {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    pub fn from_percent(percent: i64) -> Self {
        Self(percent * 100)
    }

    /// `amount × rate`, rounded up to the next whole cent. Commission uses this rounding direction.
    pub fn apply_round_up(&self, amount: Cents) -> Cents {
        let product = i128::from(amount.value()) * i128::from(self.0);
        Cents::from(narrow(div_ceil(product, BPS_SCALE)))
    }

    /// `amount × rate`, truncated to the whole cent below.
    pub fn apply_round_down(&self, amount: Cents) -> Cents {
        let product = i128::from(amount.value()) * i128::from(self.0);
        Cents::from(narrow(product.div_euclid(BPS_SCALE)))
    }

    /// The gross amount whose net (after deducting this rate) is `net`, rounded up to the cent.
    ///
    /// Used to show buyers a listing price that leaves the seller with their asking price. Returns `None` for rates of
    /// 100% or more.
    pub fn gross_up(&self, net: Cents) -> Option<Cents> {
        let denominator = BPS_SCALE - i128::from(self.0);
        if denominator <= 0 {
            return None;
        }
        let numerator = i128::from(net.value()) * BPS_SCALE;
        Some(Cents::from(narrow(div_ceil(numerator, denominator))))
    }
}

fn div_ceil(numerator: i128, denominator: i128) -> i128 {
    let q = numerator.div_euclid(denominator);
    if numerator.rem_euclid(denominator) == 0 {
        q
    } else {
        q + 1
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(v: i128) -> i64 {
    v.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_up_commission() {
        let rate = BasisPoints::from_percent(20);
        assert_eq!(rate.apply_round_up(Cents::from_reais(100)), Cents::from(2_000));
        // 20% of 0.99 = 0.198 -> 0.20
        assert_eq!(rate.apply_round_up(Cents::from(99)), Cents::from(20));
        // 10% of 0.01 = 0.001 -> 0.01
        assert_eq!(BasisPoints::from(1000).apply_round_up(Cents::from(1)), Cents::from(1));
        assert_eq!(BasisPoints::from(0).apply_round_up(Cents::from(12_345)), Cents::from(0));
    }

    #[test]
    fn round_down_cashback() {
        let rate = BasisPoints::from(50);
        // 0.5% of 199.99 = 0.99995 -> 0.99
        assert_eq!(rate.apply_round_down(Cents::from(19_999)), Cents::from(99));
        assert_eq!(BasisPoints::from(200).apply_round_down(Cents::from_reais(100)), Cents::from(200));
    }

    #[test]
    fn gross_up_displayed_price() {
        let rate = BasisPoints::from_percent(20);
        assert_eq!(rate.gross_up(Cents::from_reais(100)), Some(Cents::from_reais(125)));
        // 10 / 0.9 = 11.111.. -> 11.12
        assert_eq!(BasisPoints::from_percent(10).gross_up(Cents::from_reais(10)), Some(Cents::from(1_112)));
        assert_eq!(BasisPoints::from_percent(100).gross_up(Cents::from_reais(10)), None);
    }

    #[test]
    fn display() {
        assert_eq!(BasisPoints::from(2000).to_string(), "20.00%");
        assert_eq!(BasisPoints::from(50).to_string(), "0.50%");
        assert_eq!(BasisPoints::from(1).to_string(), "0.01%");
    }
}
