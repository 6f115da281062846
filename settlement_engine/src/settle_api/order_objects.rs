use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::db_types::{Order, OrderStatusType, PaymentMethod};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
    pub statuses: Vec<OrderStatusType>,
    pub payment_method: Option<PaymentMethod>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_buyer_id(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_seller_id(mut self, seller_id: i64) -> Self {
        self.seller_id = Some(seller_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none() &&
            self.seller_id.is_none() &&
            self.statuses.is_empty() &&
            self.payment_method.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

/// Seller dashboard figures for the current calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    /// Sum of `seller_receives` over paid orders created this month.
    pub total_revenue: Cents,
    pub total_orders: i64,
    pub pending_shipment: i64,
    pub in_transit: i64,
}

/// The outcome of applying a normalized payment status to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The order moved. Contains the order after the change.
    Moved { from: OrderStatusType, order: Order },
    /// The order was already at (or past) the requested state, or the status carries no transition.
    Unchanged(Order),
}

impl StatusChange {
    pub fn order(&self) -> &Order {
        match self {
            StatusChange::Moved { order, .. } => order,
            StatusChange::Unchanged(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            StatusChange::Moved { order, .. } => order,
            StatusChange::Unchanged(order) => order,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, StatusChange::Moved { .. })
    }
}

/// Orders touched by a background sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub changed: Vec<Order>,
    pub skipped: usize,
}

impl SweepResult {
    pub fn count(&self) -> usize {
        self.changed.len()
    }
}

/// Who is asking for an order change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated marketplace user. Only the order's buyer or seller may act, depending on the change.
    User(i64),
    /// An administrator acting on any order.
    Admin,
    /// A background worker or the carrier tracking sync.
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::Admin | Actor::System => None,
        }
    }

    pub fn is_buyer_of(&self, order: &Order) -> bool {
        self.user_id() == Some(order.buyer_id)
    }

    pub fn is_seller_of(&self, order: &Order) -> bool {
        self.user_id() == Some(order.seller_id)
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Actor::Admin | Actor::System)
    }
}
