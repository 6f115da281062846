use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::db_types::{Address, UserProfile};

const FALLBACK_MIN_PRICE: i64 = 1_500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub width_cm: u32,
    pub height_cm: u32,
    pub length_cm: u32,
    pub weight_kg: f64,
}

impl Default for PackageDimensions {
    /// A folded garment in a padded envelope.
    fn default() -> Self {
        Self { width_cm: 20, height_cm: 5, length_cm: 30, weight_kg: 0.3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuoteRequest {
    pub to_zipcode: String,
    pub from_zipcode: Option<String>,
    pub declared_value: Cents,
    #[serde(default)]
    pub package: PackageDimensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: i64,
    pub name: String,
    pub company: String,
    pub price: Cents,
    pub delivery_days: u32,
    pub delivery_min: u32,
    pub delivery_max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuotes {
    pub options: Vec<ShippingOption>,
    pub cheapest: Option<ShippingOption>,
    pub fastest: Option<ShippingOption>,
    /// True when the aggregator was unavailable and the static table was used instead.
    pub fallback: bool,
}

impl ShippingQuotes {
    pub fn new(mut options: Vec<ShippingOption>, fallback: bool) -> Self {
        options.sort_by_key(|o| o.price);
        let cheapest = options.first().cloned();
        let fastest = options.iter().min_by_key(|o| o.delivery_days).cloned();
        Self { options, cheapest, fastest, fallback }
    }
}

/// Static quotes used when the shipping aggregator cannot be reached.
///
/// PAC costs 10% of the product price with a R$15.00 floor, SEDEX 1.8× and Jadlog 1.2× that.
pub fn fallback_shipping_options(product_price: Cents) -> Vec<ShippingOption> {
    let base = (product_price.value() + 5).div_euclid(10).max(FALLBACK_MIN_PRICE);
    let scaled = |factor_tenths: i64| Cents::from((base * factor_tenths + 5).div_euclid(10));
    vec![
        ShippingOption {
            id: 1,
            name: "PAC".into(),
            company: "Correios".into(),
            price: Cents::from(base),
            delivery_days: 8,
            delivery_min: 6,
            delivery_max: 10,
        },
        ShippingOption {
            id: 2,
            name: "SEDEX".into(),
            company: "Correios".into(),
            price: scaled(18),
            delivery_days: 3,
            delivery_min: 2,
            delivery_max: 4,
        },
        ShippingOption {
            id: 3,
            name: ".Package".into(),
            company: "Jadlog".into(),
            price: scaled(12),
            delivery_days: 6,
            delivery_min: 4,
            delivery_max: 8,
        },
    ]
}

/// One end of a labelled parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelParty {
    pub name: String,
    pub email: String,
    /// CPF, digits only.
    pub document: Option<String>,
    pub street: String,
    pub number: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl LabelParty {
    pub fn new(user: &UserProfile, address: &Address) -> Self {
        let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            document: user.cpf.as_deref().map(digits).filter(|d| !d.is_empty()),
            street: address.street.clone(),
            number: address.number.clone(),
            district: address.neighborhood.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: digits(&address.zipcode),
        }
    }
}

/// Everything the aggregator needs to sell a postage label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRequest {
    /// The aggregator service picked from a quote, e.g. PAC or SEDEX.
    pub service_id: i64,
    pub order_number: String,
    pub from: LabelParty,
    pub to: LabelParty,
    pub product_title: String,
    pub declared_value: Cents,
    pub package: PackageDimensions,
}

/// A label the aggregator has sold and queued for generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedLabel {
    pub label_id: String,
    pub protocol: Option<String>,
    pub price: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    pub message: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_code: String,
    pub current_status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub events: Vec<TrackingEvent>,
}

impl TrackingInfo {
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some() || self.current_status == "delivered"
    }

    /// The parcel has been handed over to the carrier and is moving.
    pub fn is_in_transit(&self) -> bool {
        matches!(self.current_status.as_str(), "posted" | "in_transit" | "out_for_delivery")
    }
}
