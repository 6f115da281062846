//! Mercado Pago `/v1/payments` wire types.
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpIdentification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

impl MpIdentification {
    pub fn cpf(number: String) -> Self {
        Self { kind: "CPF".to_string(), number }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpPayerAddress {
    pub zip_code: String,
    pub street_name: String,
    pub street_number: String,
    pub neighborhood: String,
    pub city: String,
    pub federal_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpPayer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<MpIdentification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<MpPayerAddress>,
}

/// Body of `POST /v1/payments`. Amounts are decimal currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpPaymentRequest {
    pub transaction_amount: f64,
    pub description: String,
    /// `pix`, `bolbradesco` or a card brand such as `visa`.
    pub payment_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    pub payer: MpPayer,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpTransactionData {
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpPointOfInteraction {
    pub transaction_data: Option<MpTransactionData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpTransactionDetails {
    pub total_paid_amount: Option<f64>,
    pub net_received_amount: Option<f64>,
    pub external_resource_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpBarcode {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpCard {
    pub last_four_digits: Option<String>,
}

/// A payment as returned by both the create and the fetch endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpPayment {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub transaction_amount: Option<f64>,
    pub external_reference: Option<String>,
    pub date_of_expiration: Option<String>,
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub point_of_interaction: Option<MpPointOfInteraction>,
    #[serde(default)]
    pub transaction_details: Option<MpTransactionDetails>,
    #[serde(default)]
    pub barcode: Option<MpBarcode>,
    #[serde(default)]
    pub card: Option<MpCard>,
}

impl MpPayment {
    pub fn transaction_data(&self) -> Option<&MpTransactionData> {
        self.point_of_interaction.as_ref().and_then(|p| p.transaction_data.as_ref())
    }
}

/// Error body returned with 4xx responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpErrorResponse {
    pub message: Option<String>,
    pub error: Option<String>,
    pub status: Option<u16>,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("Invalid payment id: {other}"))),
    }
}
