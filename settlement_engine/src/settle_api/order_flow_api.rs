use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderStatusType, OrderTransition},
    events::{EventProducers, NotificationEvent, OrderAnnulledEvent, OrderPaidEvent},
    order_objects::{StatusChange, SweepResult},
    payment_objects::PaymentStatus,
    settle_api::notifications,
    traits::{CatalogManagement, OrderFlowError, OrderManagement},
};

/// `OrderFlowApi` applies payment outcomes to orders and runs the side effects of each move.
///
/// It is shared by the checkout flow (synchronous card results), the webhook reconciler and the expiry sweep, so that
/// an order reacts the same way to a payment status no matter where the status came from.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + CatalogManagement
{
    /// Moves `order` in response to a normalized gateway status.
    ///
    /// Statuses that carry no transition, repeats of a status the order already has, and statuses the order has
    /// already moved past are no-ops that return [`StatusChange::Unchanged`]. So is losing a race against a concurrent
    /// update. Side effects only run for the caller that actually moved the order.
    pub async fn apply_payment_status(&self, order: Order, status: PaymentStatus) -> Result<StatusChange, OrderFlowError> {
        let Some(target) = status.target_order_status() else {
            trace!("🔄️ Payment status {status} needs no action for order {}", order.order_number);
            return Ok(StatusChange::Unchanged(order));
        };
        if order.status == target {
            debug!("🔄️ Order {} is already {target}. Ignoring repeated {status} status.", order.order_number);
            return Ok(StatusChange::Unchanged(order));
        }
        if !order.status.can_transition_to(target) {
            if status == PaymentStatus::Paid && order.status.releases_product() {
                error!(
                    "🔄️ Order {} received an approved payment while {}. The product has been released, so the \
                     payment must be refunded manually.",
                    order.order_number, order.status
                );
            } else {
                info!(
                    "🔄️ Order {} is {}. Payment status {status} does not apply and is ignored.",
                    order.order_number, order.status
                );
            }
            return Ok(StatusChange::Unchanged(order));
        }
        let transition = OrderTransition::to(target).with_reason(format!("Gateway reported {status}"));
        self.transition(order, transition).await
    }

    /// Cancels an unpaid order and releases its product.
    pub async fn cancel_order(&self, order: Order, reason: &str) -> Result<StatusChange, OrderFlowError> {
        if !order.status.can_transition_to(OrderStatusType::Cancelled) {
            return Err(OrderFlowError::InvalidTransition {
                order_id: order.id,
                from: order.status,
                to: OrderStatusType::Cancelled,
            });
        }
        self.transition(order, OrderTransition::to(OrderStatusType::Cancelled).with_reason(reason)).await
    }

    /// Cancels every `pending_payment` order older than `timeout`.
    pub async fn expire_unpaid_orders(&self, timeout: Duration) -> Result<SweepResult, OrderFlowError> {
        let cutoff = Utc::now() - timeout;
        let stale = self.db.fetch_unpaid_orders_older_than(cutoff).await?;
        let mut result = SweepResult::default();
        for order in stale {
            let number = order.order_number.clone();
            match self.cancel_order(order, "Payment not received in time").await {
                Ok(StatusChange::Moved { order, .. }) => {
                    info!("🔄️ Unpaid order {number} expired");
                    result.changed.push(order);
                },
                Ok(StatusChange::Unchanged(_)) => result.skipped += 1,
                Err(e) => {
                    warn!("🔄️ Could not expire order {number}. {e}");
                    result.skipped += 1;
                },
            }
        }
        Ok(result)
    }

    async fn transition(&self, order: Order, transition: OrderTransition) -> Result<StatusChange, OrderFlowError> {
        let from = order.status;
        let target = transition.target;
        match self.db.transition_order(order.id, transition).await? {
            Some(updated) => {
                info!("🔄️ Order {} moved from {from} to {target}", updated.order_number);
                self.on_order_moved(from, &updated).await;
                Ok(StatusChange::Moved { from, order: updated })
            },
            None => {
                debug!("🔄️ Order {} was changed concurrently. {from} -> {target} skipped.", order.order_number);
                let current = self.db.fetch_order(order.id).await?.ok_or(OrderFlowError::OrderNotFound(order.id))?;
                Ok(StatusChange::Unchanged(current))
            },
        }
    }

    async fn on_order_moved(&self, from: OrderStatusType, order: &Order) {
        match order.status {
            OrderStatusType::PendingShipment => {
                match self.db.remove_product_from_carts(order.product_id).await {
                    Ok(n) => trace!("🔄️ Product {} removed from {n} carts", order.product_id),
                    Err(e) => error!("🔄️ Could not remove product {} from carts. {e}", order.product_id),
                }
                for notification in notifications::payment_confirmed(order) {
                    self.producers.publish_notification(NotificationEvent::from(notification)).await;
                }
                self.producers.publish_order_paid(OrderPaidEvent { order: order.clone() }).await;
            },
            OrderStatusType::Cancelled |
            OrderStatusType::PaymentFailed |
            OrderStatusType::Refunded |
            OrderStatusType::Chargeback => {
                if order.status.releases_product() {
                    debug!("🔄️ Product {} is back on sale after order {} left {from}", order.product_id, order.id);
                }
                let notification = notifications::order_annulled(order);
                self.producers.publish_notification(NotificationEvent::from(notification)).await;
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
            },
            _ => {},
        }
    }
}
