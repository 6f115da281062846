use serde::{Deserialize, Serialize};

use crate::db_types::{NewNotification, Order, OrderStatusType, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

/// Emitted once per order, when it first enters `pending_shipment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

/// The order left the happy path: cancelled, expired, payment failed, refunded or charged back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShippedEvent {
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order: Order,
    pub sale: Transaction,
    pub cashback: Option<Transaction>,
}

/// A withdrawal was approved or rejected. Approved withdrawals must be paid out by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResolvedEvent {
    pub withdrawal: Transaction,
    pub reversal: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub notification: NewNotification,
}

impl From<NewNotification> for NotificationEvent {
    fn from(notification: NewNotification) -> Self {
        Self { notification }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
    OrderShipped(OrderShippedEvent),
    OrderSettled(OrderSettledEvent),
    WithdrawalResolved(WithdrawalResolvedEvent),
    Notification(NotificationEvent),
}
