use chrono::{DateTime, Utc};
use settle_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType, OrderTransition, PaymentMethod},
    order_objects::{OrderQueryFilter, SalesStats},
    traits::{CatalogError, GatewayError, LedgerError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(i64),
    #[error("You cannot buy your own product")]
    SelfPurchase,
    #[error("Invalid address. {0}")]
    InvalidAddress(String),
    #[error("Shipping price cannot be {0}")]
    InvalidShippingPrice(Cents),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("User {user_id} is not allowed to act on order {order_id}")]
    NotOrderParticipant { user_id: i64, order_id: i64 },
    #[error("A tracking code is required to mark an order as shipped")]
    MissingTrackingCode,
    #[error("Order number {0} is already in use")]
    OrderNumberCollision(OrderNumber),
    #[error("Could not allocate a unique order number after {0} attempts")]
    OrderNumberExhausted(usize),
    #[error("Payment {0} is not linked to any order")]
    PaymentNotLinked(String),
    #[error("Order {0} already has a shipping label")]
    LabelAlreadyPurchased(i64),
    #[error("Order {0} has no shipping label")]
    NoShippingLabel(i64),
    #[error("The shipping label of order {order_id} cannot be changed while the order is {status}")]
    LabelNotAllowed { order_id: i64, status: OrderStatusType },
    #[error("Order {order_id} cannot be paid with {method} now. {reason}")]
    CheckoutNotAllowed { order_id: i64, method: PaymentMethod, reason: String },
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

/// Order storage and lifecycle moves.
///
/// All status changes go through [`OrderManagement::transition_order`], which must only succeed when the order is
/// currently in one of the predecessor states of the target. A backend that cannot guarantee this atomically is not a
/// valid implementation.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// In a single atomic transaction:
    /// * marks the product `sold`, but only if it is currently `active`,
    /// * inserts the order in `pending_payment`.
    ///
    /// Fails with [`OrderFlowError::ProductUnavailable`] when the product was not active (nothing is written), and
    /// with [`OrderFlowError::OrderNumberCollision`] when the order number is taken, so that the caller can retry
    /// with a fresh number.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError>;

    /// Resolves any payment attempt, current or previous, to its order.
    async fn fetch_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, OrderFlowError>;

    /// Records a gateway payment attempt. The order's `payment_id` and `payment_method` are updated to this attempt
    /// and the attempt is appended to the attempt history. Recording the same payment id twice is a no-op.
    async fn record_payment_attempt(
        &self,
        order_id: i64,
        payment_id: &str,
        method: PaymentMethod,
    ) -> Result<Order, OrderFlowError>;

    /// Conditionally moves an order to `transition.target`.
    ///
    /// The update only applies if the order is currently in one of `OrderStatusType::predecessors(target)`. Returns the
    /// updated order, or `None` if the condition did not hold (including when another caller won a race). Timestamps
    /// matching the target (`paid_at`, `shipped_at`, ...) are set in the same statement. Moving into a state that
    /// releases the product sets the product back to `active` in the same transaction.
    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
    ) -> Result<Option<Order>, OrderFlowError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    /// Orders in `pending_payment` created before `cutoff`.
    async fn fetch_unpaid_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    /// Orders in `delivered` whose delivery was confirmed before `cutoff`.
    async fn fetch_delivered_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    /// Orders with a tracking code that are still moving (`shipped` or `in_transit`).
    async fn fetch_orders_in_transit(&self) -> Result<Vec<Order>, OrderFlowError>;

    async fn sales_stats(&self, seller_id: i64, since: DateTime<Utc>) -> Result<SalesStats, OrderFlowError>;
}
