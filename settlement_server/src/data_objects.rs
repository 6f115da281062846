use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settle_common::Cents;
use settlement_engine::{
    db_types::{OrderStatusType, PaymentMethod, Transaction, TransactionStatus, TransactionType},
    ledger_objects::Settlement,
    payment_objects::{CardDetails, PaymentDetails, WebhookData, WebhookNotification},
    shipping_objects::{PackageDimensions, ShippingQuoteRequest},
    PurchaseRequest,
    ShippingChoice,
};

use crate::errors::ServerError;

const MAX_INSTALLMENTS: u32 = 12;
const MAX_TRANSACTION_PAGE: i64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------        Orders         ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOptionChoice {
    pub service: String,
    pub price: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: i64,
    #[serde(default)]
    pub address_id: Option<i64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_option: Option<ShippingOptionChoice>,
}

impl CreateOrderRequest {
    pub fn into_purchase_request(self, buyer_id: i64) -> Result<PurchaseRequest, ServerError> {
        let shipping = match self.shipping_option {
            Some(choice) if choice.service.trim().is_empty() => {
                return Err(ServerError::InvalidRequestBody("The shipping service name cannot be empty".into()));
            },
            Some(choice) => Some(ShippingChoice { service: choice.service.trim().to_string(), price: choice.price }),
            None => None,
        };
        Ok(PurchaseRequest {
            buyer_id,
            product_id: self.product_id,
            address_id: self.address_id,
            payment_method: self.payment_method,
            shipping,
        })
    }
}

/// Body of `PATCH /api/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

/// Buys a postage label for the order, using a service id picked from a shipping quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLabelRequest {
    pub order_id: i64,
    pub service_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelOrderRequest {
    pub order_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelUrlResponse {
    pub label_url: String,
}

impl UpdateStatusRequest {
    /// Only the shipping side of the lifecycle can be driven by hand. Payment states belong to the gateway.
    pub fn validate(&self) -> Result<(), ServerError> {
        match self.status {
            OrderStatusType::Shipped |
            OrderStatusType::InTransit |
            OrderStatusType::Delivered |
            OrderStatusType::Completed => Ok(()),
            other => Err(ServerError::Rejected(format!("The order status cannot be set to {other} by hand"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResponse {
    pub order: settlement_engine::db_types::Order,
    pub sale: Transaction,
    pub cashback: Option<Transaction>,
}

impl From<Settlement> for SettlementResponse {
    fn from(s: Settlement) -> Self {
        Self { order: s.order, sale: s.sale, cashback: s.cashback }
    }
}

/// Query string of the purchases and sales listings. `?status=all`, or no status at all, lists every order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
}

impl OrderListParams {
    pub fn status(&self) -> Result<Option<OrderStatusType>, ServerError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(s) => s
                .parse::<OrderStatusType>()
                .map(Some)
                .map_err(|_| ServerError::InvalidQueryParameter(format!("'{s}' is not an order status"))),
        }
    }
}

//--------------------------------------       Checkout        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixCheckoutRequest {
    pub order_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoletoCheckoutRequest {
    pub order_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCheckoutRequest {
    pub order_id: i64,
    pub card_token: String,
    #[serde(default = "one")]
    pub installments: u32,
    pub payment_method_id: String,
    #[serde(default)]
    pub issuer_id: Option<String>,
}

fn one() -> u32 {
    1
}

impl CardCheckoutRequest {
    pub fn into_details(self) -> Result<(i64, PaymentDetails), ServerError> {
        if self.card_token.trim().is_empty() {
            return Err(ServerError::InvalidRequestBody("A card token is required".into()));
        }
        if self.payment_method_id.trim().is_empty() {
            return Err(ServerError::InvalidRequestBody("The card brand (payment_method_id) is required".into()));
        }
        if !(1..=MAX_INSTALLMENTS).contains(&self.installments) {
            return Err(ServerError::InvalidRequestBody(format!(
                "Installments must be between 1 and {MAX_INSTALLMENTS}"
            )));
        }
        let details = CardDetails {
            token: self.card_token,
            installments: self.installments,
            payment_method_id: self.payment_method_id,
            issuer_id: self.issuer_id.filter(|s| !s.is_empty()),
        };
        Ok((self.order_id, PaymentDetails::Card(details)))
    }
}

/// Payment providers put the notification in the query string (`?type=payment&data.id=123`, or the older
/// `?topic=payment&id=123`) as well as, or instead of, the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookQueryParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

impl WebhookQueryParams {
    pub fn into_notification(self) -> Option<WebhookNotification> {
        let kind = self.kind.or(self.topic)?;
        let payment_id = self.data_id.or_else(|| self.id.clone())?;
        Some(WebhookNotification {
            id: None,
            kind: Some(kind),
            action: None,
            data: Some(WebhookData { id: Some(payment_id) }),
        })
    }
}

//--------------------------------------       Shipping        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingCalculateRequest {
    pub to_zipcode: String,
    #[serde(default)]
    pub from_zipcode: Option<String>,
    /// The product's price is used as the declared value when given.
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub declared_value: Option<Cents>,
    #[serde(default)]
    pub package: Option<PackageDimensions>,
}

impl ShippingCalculateRequest {
    pub fn to_zipcode(&self) -> Result<String, ServerError> {
        normalize_zipcode(&self.to_zipcode)
            .ok_or_else(|| ServerError::InvalidRequestBody(format!("'{}' is not a valid CEP", self.to_zipcode)))
    }

    pub fn into_quote_request(self, declared_value: Cents) -> Result<ShippingQuoteRequest, ServerError> {
        let to_zipcode = self.to_zipcode()?;
        let from_zipcode = match self.from_zipcode.as_deref() {
            Some(z) => Some(
                normalize_zipcode(z).ok_or_else(|| ServerError::InvalidRequestBody(format!("'{z}' is not a valid CEP")))?,
            ),
            None => None,
        };
        Ok(ShippingQuoteRequest { to_zipcode, from_zipcode, declared_value, package: self.package.unwrap_or_default() })
    }
}

/// Brazilian postal codes have 8 digits. `01310-100` and `01310100` are both accepted.
pub fn normalize_zipcode(zipcode: &str) -> Option<String> {
    let digits = zipcode.chars().filter(char::is_ascii_digit).collect::<String>();
    let only_digits_and_dash = zipcode.trim().chars().all(|c| c.is_ascii_digit() || c == '-');
    (digits.len() == 8 && only_digits_and_dash).then_some(digits)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkShippedRequest {
    pub order_id: i64,
    pub tracking_code: String,
    #[serde(default)]
    pub carrier: Option<String>,
}

//--------------------------------------       Payments        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Cents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawalListParams {
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQueryParams {
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

impl TransactionQueryParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(MAX_TRANSACTION_PAGE).clamp(1, MAX_TRANSACTION_PAGE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalAction {
    Approve,
    Reject,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zipcodes() {
        assert_eq!(normalize_zipcode("01310-100").as_deref(), Some("01310100"));
        assert_eq!(normalize_zipcode(" 20040020 ").as_deref(), Some("20040020"));
        assert_eq!(normalize_zipcode("0131010"), None);
        assert_eq!(normalize_zipcode("01310-10a"), None);
    }

    #[test]
    fn only_shipping_statuses_can_be_set() {
        let req = |status| UpdateStatusRequest { status, tracking_code: None, carrier: None };
        assert!(req(OrderStatusType::Shipped).validate().is_ok());
        assert!(req(OrderStatusType::Completed).validate().is_ok());
        assert!(matches!(req(OrderStatusType::PendingShipment).validate(), Err(ServerError::Rejected(_))));
        assert!(matches!(req(OrderStatusType::Refunded).validate(), Err(ServerError::Rejected(_))));
    }

    #[test]
    fn card_checkout_validation() {
        let json = serde_json::json!({"order_id": 3, "card_token": "tok", "payment_method_id": "visa"});
        let req: CardCheckoutRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.installments, 1);
        let (order_id, details) = req.clone().into_details().unwrap();
        assert_eq!(order_id, 3);
        assert_eq!(details.method(), PaymentMethod::Card);
        let too_many = CardCheckoutRequest { installments: 13, ..req.clone() };
        assert!(too_many.into_details().is_err());
        let no_token = CardCheckoutRequest { card_token: " ".into(), ..req };
        assert!(no_token.into_details().is_err());
    }

    #[test]
    fn order_list_params() {
        let all = OrderListParams { status: Some("all".into()) };
        assert_eq!(all.status().unwrap(), None);
        assert_eq!(OrderListParams::default().status().unwrap(), None);
        let shipped = OrderListParams { status: Some("shipped".into()) };
        assert_eq!(shipped.status().unwrap(), Some(OrderStatusType::Shipped));
        let nonsense = OrderListParams { status: Some("lost_at_sea".into()) };
        assert!(matches!(nonsense.status(), Err(ServerError::InvalidQueryParameter(_))));
    }

    #[test]
    fn webhook_query_params() {
        let params: WebhookQueryParams =
            serde_json::from_value(serde_json::json!({"type": "payment", "data.id": "123"})).unwrap();
        let n = params.into_notification().unwrap();
        assert!(n.is_payment());
        assert_eq!(n.payment_id(), Some("123"));
        let legacy: WebhookQueryParams =
            serde_json::from_value(serde_json::json!({"topic": "payment", "id": "77"})).unwrap();
        assert_eq!(legacy.into_notification().unwrap().payment_id(), Some("77"));
        assert!(WebhookQueryParams::default().into_notification().is_none());
    }

    #[test]
    fn create_order_request() {
        let json = serde_json::json!({
            "product_id": 5,
            "payment_method": "pix",
            "shipping_option": {"service": " SEDEX ", "price": 2700}
        });
        let req: CreateOrderRequest = serde_json::from_value(json).unwrap();
        let purchase = req.into_purchase_request(9).unwrap();
        assert_eq!(purchase.buyer_id, 9);
        assert_eq!(purchase.payment_method, PaymentMethod::Pix);
        let shipping = purchase.shipping.unwrap();
        assert_eq!(shipping.service, "SEDEX");
        assert_eq!(shipping.price, Cents::from(2_700));
    }
}
