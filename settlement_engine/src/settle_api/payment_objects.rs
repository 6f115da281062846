use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use settle_common::Cents;

use crate::db_types::{Address, Order, OrderNumber, OrderStatusType, PaymentMethod, UserProfile};

//--------------------------------------   Gateway statuses    ---------------------------------------------------------
/// A payment status exactly as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Approved,
    Authorized,
    Pending,
    InProcess,
    InMediation,
    Rejected,
    Refunded,
    Cancelled,
    ChargedBack,
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for GatewayStatus {
    fn from(value: &str) -> Self {
        match value {
            "approved" => Self::Approved,
            "authorized" => Self::Authorized,
            "pending" => Self::Pending,
            "in_process" => Self::InProcess,
            "in_mediation" => Self::InMediation,
            "rejected" => Self::Rejected,
            "refunded" => Self::Refunded,
            "cancelled" => Self::Cancelled,
            "charged_back" => Self::ChargedBack,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approved => "approved",
            Self::Authorized => "authorized",
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::InMediation => "in_mediation",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
            Self::ChargedBack => "charged_back",
            Self::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

impl GatewayStatus {
    pub fn normalize(&self) -> PaymentStatus {
        match self {
            Self::Approved => PaymentStatus::Paid,
            Self::Pending => PaymentStatus::PendingPayment,
            Self::InProcess => PaymentStatus::Processing,
            Self::Rejected => PaymentStatus::PaymentFailed,
            Self::Refunded => PaymentStatus::Refunded,
            Self::Cancelled => PaymentStatus::Cancelled,
            Self::ChargedBack => PaymentStatus::Chargeback,
            Self::Authorized | Self::InMediation | Self::Other(_) => PaymentStatus::Unknown,
        }
    }
}

/// The engine's view of a payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    PendingPayment,
    Processing,
    PaymentFailed,
    Refunded,
    Cancelled,
    Chargeback,
    Unknown,
}

impl PaymentStatus {
    /// The order state this status drives the order into. `None` means there is nothing to do.
    pub fn target_order_status(&self) -> Option<OrderStatusType> {
        match self {
            Self::Paid => Some(OrderStatusType::PendingShipment),
            Self::Processing => Some(OrderStatusType::Processing),
            Self::PaymentFailed => Some(OrderStatusType::PaymentFailed),
            Self::Refunded => Some(OrderStatusType::Refunded),
            Self::Cancelled => Some(OrderStatusType::Cancelled),
            Self::Chargeback => Some(OrderStatusType::Chargeback),
            Self::PendingPayment | Self::Unknown => None,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Paid => "paid",
            Self::PendingPayment => "pending_payment",
            Self::Processing => "processing",
            Self::PaymentFailed => "payment_failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
            Self::Chargeback => "chargeback",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

//--------------------------------------   Gateway requests    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Digits only.
    pub cpf: Option<String>,
    pub address: Option<Address>,
}

impl PayerProfile {
    pub fn from_user(user: &UserProfile, address: Option<Address>) -> Self {
        let first_name = match user.first_name() {
            "" => "Cliente".to_string(),
            name => name.to_string(),
        };
        let cpf = user.cpf.as_ref().map(|c| c.chars().filter(char::is_ascii_digit).collect::<String>());
        Self { email: user.email.clone(), first_name, last_name: user.last_name(), cpf, address }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Card token produced by the gateway's client-side SDK. Raw card numbers never reach this service.
    pub token: String,
    pub installments: u32,
    pub payment_method_id: String,
    pub issuer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentDetails {
    Pix,
    Card(CardDetails),
    Boleto,
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Pix => PaymentMethod::Pix,
            Self::Card(_) => PaymentMethod::Card,
            Self::Boleto => PaymentMethod::Boleto,
        }
    }
}

/// Everything the gateway needs to create a payment for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub amount: Cents,
    pub description: String,
    pub payer: PayerProfile,
    pub details: PaymentDetails,
}

impl PaymentRequest {
    pub fn for_order(order: &Order, payer: PayerProfile, details: PaymentDetails) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            amount: order.total_amount,
            description: format!("Pedido #{}", order.order_number),
            payer,
            details,
        }
    }

    /// The gateway's external reference. Webhooks echo it back.
    pub fn external_reference(&self) -> String {
        self.order_id.to_string()
    }
}

/// What the buyer needs to complete the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstructions {
    Pix {
        qr_code: Option<String>,
        qr_code_base64: Option<String>,
        ticket_url: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    Card {
        authorization_code: Option<String>,
        last_four_digits: Option<String>,
    },
    Boleto {
        boleto_url: Option<String>,
        barcode: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub payment_id: String,
    pub status: GatewayStatus,
    pub status_detail: Option<String>,
    pub instructions: PaymentInstructions,
}

/// The authoritative payment state, fetched from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub payment_id: String,
    pub status: GatewayStatus,
    pub status_detail: Option<String>,
    pub amount: Cents,
    pub paid_amount: Option<Cents>,
    pub net_amount: Option<Cents>,
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub payment: PaymentHandle,
}

//--------------------------------------       Webhooks        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
}

/// A gateway notification. Gateways send ids as either numbers or strings, so both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, rename = "type", alias = "topic")]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

impl WebhookNotification {
    pub fn for_payment<S: Into<String>>(payment_id: S) -> Self {
        Self {
            id: None,
            kind: Some("payment".to_string()),
            action: None,
            data: Some(WebhookData { id: Some(payment_id.into()) }),
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_payment(&self) -> bool {
        matches!(self.kind.as_deref(), None | Some("payment"))
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.id.as_deref()).filter(|id| !id.is_empty())
    }

    /// The key used to deduplicate retries. Falls back to the payment id and action when the gateway omits an id.
    pub fn notification_id(&self) -> Option<String> {
        match (&self.id, self.payment_id()) {
            (Some(id), _) => Some(id.clone()),
            (None, Some(pid)) => Some(format!("{pid}:{}", self.action.as_deref().unwrap_or("payment"))),
            (None, None) => None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            ("approved", PaymentStatus::Paid),
            ("pending", PaymentStatus::PendingPayment),
            ("in_process", PaymentStatus::Processing),
            ("rejected", PaymentStatus::PaymentFailed),
            ("refunded", PaymentStatus::Refunded),
            ("cancelled", PaymentStatus::Cancelled),
            ("charged_back", PaymentStatus::Chargeback),
            ("in_mediation", PaymentStatus::Unknown),
            ("something_new", PaymentStatus::Unknown),
        ];
        for (raw, expected) in cases {
            assert_eq!(GatewayStatus::from(raw).normalize(), expected, "{raw}");
        }
        assert_eq!(PaymentStatus::Paid.target_order_status(), Some(OrderStatusType::PendingShipment));
        assert_eq!(PaymentStatus::PendingPayment.target_order_status(), None);
        assert_eq!(PaymentStatus::Unknown.target_order_status(), None);
    }

    #[test]
    fn gateway_status_serde() {
        let status: GatewayStatus = serde_json::from_str("\"charged_back\"").unwrap();
        assert_eq!(status, GatewayStatus::ChargedBack);
        let status: GatewayStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(status, GatewayStatus::Other("expired".into()));
    }

    #[test]
    fn webhook_ids() {
        let json = r#"{"id": 12345, "type": "payment", "action": "payment.updated", "data": {"id": "999"}}"#;
        let n: WebhookNotification = serde_json::from_str(json).unwrap();
        assert_eq!(n.payment_id(), Some("999"));
        assert_eq!(n.notification_id().as_deref(), Some("12345"));
        assert!(n.is_payment());

        let json = r#"{"topic": "payment", "data": {"id": 777}}"#;
        let n: WebhookNotification = serde_json::from_str(json).unwrap();
        assert_eq!(n.payment_id(), Some("777"));
        assert_eq!(n.notification_id().as_deref(), Some("777:payment"));

        let json = r#"{"type": "merchant_order", "data": {"id": "1"}}"#;
        let n: WebhookNotification = serde_json::from_str(json).unwrap();
        assert!(!n.is_payment());

        let n: WebhookNotification = serde_json::from_str("{}").unwrap();
        assert_eq!(n.payment_id(), None);
        assert_eq!(n.notification_id(), None);
    }
}
