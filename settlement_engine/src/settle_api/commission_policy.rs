//! Commission and cashback rates.
//!
//! The platform takes its commission out of the seller's asking price, so buyers pay `product_price + shipping` and
//! sellers receive `product_price - commission`. The rate depends on the seller's subscription tier and on whether the
//! seller holds a launch promotion. It is snapshotted onto each order at creation.
//!
//! Buyers earn cashback on the product price when an order completes. Premium buyers earn less cashback because their
//! subscription already discounts their own selling fees.
use serde::{Deserialize, Serialize};
use settle_common::{BasisPoints, Cents};

use crate::db_types::{PriceBreakdown, PromoType, SubscriptionTier};

pub const DEFAULT_FREE_COMMISSION: BasisPoints = BasisPoints::from_bps(2_000);
pub const DEFAULT_PREMIUM_COMMISSION: BasisPoints = BasisPoints::from_bps(1_000);
pub const DEFAULT_PROMO_COMMISSION: BasisPoints = BasisPoints::from_bps(500);
pub const DEFAULT_FREE_CASHBACK: BasisPoints = BasisPoints::from_bps(200);
pub const DEFAULT_PREMIUM_CASHBACK: BasisPoints = BasisPoints::from_bps(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPolicy {
    pub free_commission: BasisPoints,
    pub premium_commission: BasisPoints,
    pub promo_commission: BasisPoints,
    pub free_cashback: BasisPoints,
    pub premium_cashback: BasisPoints,
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            free_commission: DEFAULT_FREE_COMMISSION,
            premium_commission: DEFAULT_PREMIUM_COMMISSION,
            promo_commission: DEFAULT_PROMO_COMMISSION,
            free_cashback: DEFAULT_FREE_CASHBACK,
            premium_cashback: DEFAULT_PREMIUM_CASHBACK,
        }
    }
}

impl CommissionPolicy {
    /// The commission rate for a seller. A promotion never makes the rate worse than the seller's tier rate.
    pub fn commission_rate(&self, tier: SubscriptionTier, promo: Option<PromoType>) -> BasisPoints {
        let tier_rate = match tier {
            SubscriptionTier::Free => self.free_commission,
            SubscriptionTier::Premium => self.premium_commission,
        };
        match promo {
            Some(_) => tier_rate.min(self.promo_commission),
            None => tier_rate,
        }
    }

    pub fn cashback_rate(&self, buyer_tier: SubscriptionTier) -> BasisPoints {
        match buyer_tier {
            SubscriptionTier::Free => self.free_cashback,
            SubscriptionTier::Premium => self.premium_cashback,
        }
    }

    /// Cashback is truncated to the cent, so it never exceeds the advertised percentage.
    pub fn cashback_for(&self, buyer_tier: SubscriptionTier, product_price: Cents) -> Cents {
        self.cashback_rate(buyer_tier).apply_round_down(product_price)
    }

    pub fn price_breakdown(&self, product_price: Cents, shipping_price: Cents, rate: BasisPoints) -> PriceBreakdown {
        let commission_amount = rate.apply_round_up(product_price);
        PriceBreakdown {
            product_price,
            shipping_price,
            commission_rate: rate,
            commission_amount,
            seller_receives: product_price - commission_amount,
            total_amount: product_price + shipping_price,
        }
    }

    /// The listing price that would leave the seller with `asking_price` after commission.
    ///
    /// Returns `None` if the rate is 100% or more.
    pub fn displayed_price(&self, asking_price: Cents, rate: BasisPoints) -> Option<Cents> {
        rate.gross_up(asking_price)
    }
}
