use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::{BasisPoints, Cents};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `Display` and `FromStr` for a fieldless enum using the same snake_case names that are stored in the
/// database and used on the wire.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(ConversionError::new(stringify!($name), other)),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle state of an order.
///
/// Legal moves are encoded in [`OrderStatusType::can_transition_to`]. Every status update in the database is
/// conditional on the current status being one of [`OrderStatusType::predecessors`] of the target, so a racing or
/// replayed update is a no-op rather than an illegal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Created and reserved, waiting for the buyer to pay.
    PendingPayment,
    /// The gateway is still analysing the payment.
    Processing,
    /// Paid. Waiting for the seller to hand the parcel to a carrier.
    PendingShipment,
    Shipped,
    InTransit,
    Delivered,
    /// Funds released to the seller. Terminal.
    Completed,
    /// Cancelled or expired before payment. Terminal.
    Cancelled,
    /// The gateway definitively rejected the payment. Terminal.
    PaymentFailed,
    Refunded,
    Chargeback,
}

string_enum!(OrderStatusType {
    PendingPayment => "pending_payment",
    Processing => "processing",
    PendingShipment => "pending_shipment",
    Shipped => "shipped",
    InTransit => "in_transit",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    PaymentFailed => "payment_failed",
    Refunded => "refunded",
    Chargeback => "chargeback",
});

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 11] = [
        OrderStatusType::PendingPayment,
        OrderStatusType::Processing,
        OrderStatusType::PendingShipment,
        OrderStatusType::Shipped,
        OrderStatusType::InTransit,
        OrderStatusType::Delivered,
        OrderStatusType::Completed,
        OrderStatusType::Cancelled,
        OrderStatusType::PaymentFailed,
        OrderStatusType::Refunded,
        OrderStatusType::Chargeback,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::PaymentFailed | Self::Refunded | Self::Chargeback)
    }

    /// True if the product of an order in this state has been paid for and cannot be released back to the catalog.
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::PendingShipment | Self::Shipped | Self::InTransit | Self::Delivered | Self::Completed)
    }

    /// Moving into this state hands the product back to the catalog.
    pub fn releases_product(&self) -> bool {
        matches!(self, Self::Cancelled | Self::PaymentFailed)
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match (*self, next) {
            (PendingPayment, Processing | PendingShipment | Cancelled | PaymentFailed) => true,
            (Processing, PendingShipment | PaymentFailed | Cancelled) => true,
            (PendingShipment, Shipped) => true,
            (Shipped, InTransit | Delivered) => true,
            (InTransit, Delivered) => true,
            (Delivered, Completed) => true,
            (current, Refunded | Chargeback) => !current.is_terminal(),
            _ => false,
        }
    }

    /// The set of states from which `target` can be reached in one step.
    pub fn predecessors(target: OrderStatusType) -> Vec<OrderStatusType> {
        Self::ALL.into_iter().filter(|s| s.can_transition_to(target)).collect()
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Instant transfer, paid by scanning a QR code.
    Pix,
    /// Card authorization. The gateway usually answers synchronously.
    Card,
    /// Deferred bank slip. Requires a full payer address.
    Boleto,
}

string_enum!(PaymentMethod { Pix => "pix", Card => "card", Boleto => "boleto" });

impl PaymentMethod {
    pub fn requires_address(&self) -> bool {
        matches!(self, Self::Boleto)
    }
}

//--------------------------------------  Subscriptions & promos  -----------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

string_enum!(SubscriptionTier { Free => "free", Premium => "premium" });

/// Launch promotions grant the reduced commission rate regardless of tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromoType {
    PremiumLaunch,
    ReducedRateLaunch,
}

string_enum!(PromoType { PremiumLaunch => "premium_launch", ReducedRateLaunch => "reduced_rate_launch" });

//--------------------------------------        Roles          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    ReadAll,
    Admin,
}

string_enum!(Role { User => "user", ReadAll => "read_all", Admin => "admin" });

//--------------------------------------       Users           ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Brazilian taxpayer id. Required by the gateway for boleto payments.
    pub cpf: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub promo_type: Option<PromoType>,
    pub balance: Cents,
    pub cashback_balance: Cents,
    pub total_sales: i64,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or_default()
    }

    pub fn last_name(&self) -> String {
        self.name.split_whitespace().skip(1).collect::<Vec<_>>().join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub cpf: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub promo_type: Option<PromoType>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), cpf: None, subscription_tier: SubscriptionTier::Free, promo_type: None }
    }

    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_tier = tier;
        self
    }

    pub fn with_promo(mut self, promo: PromoType) -> Self {
        self.promo_type = Some(promo);
        self
    }

    pub fn with_cpf<S: Into<String>>(mut self, cpf: S) -> Self {
        self.cpf = Some(cpf.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub user_id: i64,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

//--------------------------------------      Products         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Reserved,
    Sold,
    Deleted,
}

string_enum!(ProductStatus { Active => "active", Reserved => "reserved", Sold => "sold", Deleted => "deleted" });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    /// The amount the seller asked for. Commission is taken out of this amount.
    pub price: Cents,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: i64,
    pub title: String,
    pub price: Cents,
}

//--------------------------------------        Orders         ---------------------------------------------------------
/// The human-readable order reference, `AP{YYYY}{MM}{NNNN}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The money snapshot of an order. Computed once at creation and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub product_price: Cents,
    pub shipping_price: Cents,
    pub commission_rate: BasisPoints,
    pub commission_amount: Cents,
    pub seller_receives: Cents,
    pub total_amount: Cents,
}

impl PriceBreakdown {
    pub fn is_consistent(&self) -> bool {
        self.total_amount == self.product_price + self.shipping_price &&
            self.seller_receives == self.product_price - self.commission_amount &&
            self.commission_amount == self.commission_rate.apply_round_up(self.product_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    pub product_price: Cents,
    pub shipping_price: Cents,
    pub shipping_service: Option<String>,
    pub commission_rate: BasisPoints,
    pub commission_amount: Cents,
    pub seller_receives: Cents,
    pub total_amount: Cents,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipping_address_id: Option<i64>,
    pub shipping_carrier: Option<String>,
    pub tracking_code: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown {
            product_price: self.product_price,
            shipping_price: self.shipping_price,
            commission_rate: self.commission_rate,
            commission_amount: self.commission_amount,
            seller_receives: self.seller_receives,
            total_amount: self.total_amount,
        }
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    pub breakdown: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub shipping_address_id: Option<i64>,
    pub shipping_service: Option<String>,
}

/// A requested status change plus the fields that accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTransition {
    pub target: OrderStatusType,
    pub tracking_code: Option<String>,
    pub carrier: Option<String>,
    pub reason: Option<String>,
}

impl OrderTransition {
    pub fn to(target: OrderStatusType) -> Self {
        Self { target, tracking_code: None, carrier: None, reason: None }
    }

    pub fn shipped<S: Into<String>>(tracking_code: S, carrier: Option<String>) -> Self {
        Self { tracking_code: Some(tracking_code.into()), carrier, ..Self::to(OrderStatusType::Shipped) }
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Every payment attempt made against an order. An order can be paid on the second or third attempt, so webhooks for
/// any earlier attempt must still resolve to the right order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderPayment {
    pub id: i64,
    pub order_id: i64,
    pub payment_id: String,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Ledger         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Cashback,
    Withdrawal,
    WithdrawalReversal,
}

string_enum!(TransactionType {
    Sale => "sale",
    Cashback => "cashback",
    Withdrawal => "withdrawal",
    WithdrawalReversal => "withdrawal_reversal",
});

/// The two balances a user holds. Each ledger entry moves exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    Earnings,
    Cashback,
}

impl TransactionType {
    pub fn balance_kind(&self) -> BalanceKind {
        match self {
            Self::Cashback => BalanceKind::Cashback,
            Self::Sale | Self::Withdrawal | Self::WithdrawalReversal => BalanceKind::Earnings,
        }
    }

    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Withdrawal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Approved,
    Rejected,
}

string_enum!(TransactionStatus {
    Completed => "completed",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// An immutable ledger entry. `amount` is signed: withdrawals are negative.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Cents,
    pub status: TransactionStatus,
    pub description: String,
    /// For a reversal, the id of the withdrawal it cancels.
    pub reference_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub tx_type: TransactionType,
    pub amount: Cents,
    pub status: TransactionStatus,
    pub description: String,
    pub reference_id: Option<i64>,
}

impl NewTransaction {
    pub fn new<S: Into<String>>(user_id: i64, tx_type: TransactionType, amount: Cents, description: S) -> Self {
        let status = if tx_type.is_debit() { TransactionStatus::Pending } else { TransactionStatus::Completed };
        Self { user_id, order_id: None, tx_type, amount, status, description: description.into(), reference_id: None }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_reference(mut self, reference_id: i64) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: i64,
    pub balance: Cents,
    pub cashback_balance: Cents,
}

//--------------------------------------    Notifications      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(user_id: i64, kind: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { user_id, kind: kind.into(), title: title.into(), message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

//--------------------------------------   Webhook retries     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RetryStatus {
    Pending,
    Done,
    Abandoned,
}

string_enum!(RetryStatus { Pending => "pending", Done => "done", Abandoned => "abandoned" });

/// A webhook notification whose processing failed and must be attempted again.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WebhookRetry {
    pub id: i64,
    pub notification_id: String,
    pub payment_id: String,
    pub attempts: i64,
    pub status: RetryStatus,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   Shipping labels     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Purchased,
    Cancelled,
}

string_enum!(LabelStatus { Purchased => "purchased", Cancelled => "cancelled" });

/// A postage label bought from the shipping aggregator for an order. An order has at most one purchased label at a
/// time; cancelled labels are kept for the record.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShippingLabel {
    pub id: i64,
    pub order_id: i64,
    /// The aggregator's id for the label.
    pub label_id: String,
    pub service_id: i64,
    pub protocol: Option<String>,
    pub price: Cents,
    pub status: LabelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShippingLabel {
    pub order_id: i64,
    pub label_id: String,
    pub service_id: i64,
    pub protocol: Option<String>,
    pub price: Cents,
}
