//! Melhor Envio wire types for quotes, tracking and labels.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MePostalCode {
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeProduct {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub length: u32,
    pub weight: f64,
    pub insurance_value: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeOptions {
    pub insurance_value: f64,
    pub receipt: bool,
    pub own_hand: bool,
}

/// Body of `POST /me/shipment/calculate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeCalculateRequest {
    pub from: MePostalCode,
    pub to: MePostalCode,
    pub products: Vec<MeProduct>,
    pub options: MeOptions,
    /// Empty for every service the account has enabled.
    pub services: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeCompany {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeDeliveryRange {
    pub min: u32,
    pub max: u32,
}

/// One carrier service in a quote. Unavailable services carry `error` instead of a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeQuote {
    pub id: i64,
    pub name: String,
    pub price: Option<String>,
    pub custom_price: Option<String>,
    pub delivery_time: Option<u32>,
    pub custom_delivery_time: Option<u32>,
    pub delivery_range: Option<MeDeliveryRange>,
    pub company: Option<MeCompany>,
    pub error: Option<String>,
}

impl MeQuote {
    pub fn is_available(&self) -> bool {
        self.error.is_none() && self.effective_price().is_some()
    }

    /// The price the account pays, which includes negotiated discounts when present.
    pub fn effective_price(&self) -> Option<&str> {
        self.custom_price.as_deref().or(self.price.as_deref())
    }

    pub fn effective_delivery_time(&self) -> u32 {
        self.custom_delivery_time.or(self.delivery_time).unwrap_or_default()
    }

    pub fn company_name(&self) -> String {
        self.company.as_ref().and_then(|c| c.name.clone()).unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeTrackingEvent {
    pub status: Option<String>,
    pub message: Option<String>,
    pub date: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl MeTrackingEvent {
    pub fn location(&self) -> Option<String> {
        self.city.as_ref().map(|city| format!("{city}/{}", self.state.as_deref().unwrap_or_default()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeTracking {
    pub status: Option<String>,
    pub delivered_at: Option<String>,
    #[serde(default)]
    pub tracking: Vec<MeTrackingEvent>,
}

//--------------------------------------       Labels          ---------------------------------------------------------

/// Sender or recipient of a label. Documents and postal codes are digits only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeCartParty {
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    pub document: Option<String>,
    pub company_document: Option<String>,
    pub state_register: Option<String>,
    pub address: String,
    pub complement: String,
    pub number: String,
    pub district: String,
    pub city: String,
    pub state_abbr: String,
    pub country_id: String,
    pub postal_code: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeCartProduct {
    pub name: String,
    pub quantity: u32,
    pub unitary_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeVolume {
    pub width: u32,
    pub height: u32,
    pub length: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeTag {
    pub tag: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeCartOptions {
    pub insurance_value: f64,
    pub receipt: bool,
    pub own_hand: bool,
    pub reverse: bool,
    pub non_commercial: bool,
    pub platform: String,
    pub tags: Vec<MeTag>,
}

/// Body of `POST /me/cart`. `agency` is left empty so the carrier collects from the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeCartRequest {
    pub service: i64,
    pub agency: Option<i64>,
    pub from: MeCartParty,
    pub to: MeCartParty,
    pub products: Vec<MeCartProduct>,
    pub volumes: Vec<MeVolume>,
    pub options: MeCartOptions,
}

/// Melhor Envio sends amounts as numbers on some endpoints and as decimal strings on others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeAmount {
    Text(String),
    Number(f64),
}

impl MeAmount {
    pub fn to_decimal_string(&self) -> String {
        match self {
            MeAmount::Text(s) => s.clone(),
            MeAmount::Number(n) => format!("{n:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeCartItem {
    pub id: String,
    pub protocol: Option<String>,
    pub price: Option<MeAmount>,
    pub status: Option<String>,
}

/// Body shared by the checkout, generate and cancel calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeOrdersRequest {
    pub orders: Vec<String>,
}

impl MeOrdersRequest {
    pub fn single(id: &str) -> Self {
        Self { orders: vec![id.to_string()] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MePrintRequest {
    /// `public` answers with a URL to the PDF.
    pub mode: String,
    pub orders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MePrintResponse {
    pub url: String,
}
