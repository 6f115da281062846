use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Address, Order, OrderStatusType},
    events::EventProducers,
    payment_objects::{CheckoutResult, GatewayPayment, PayerProfile, PaymentDetails, PaymentRequest},
    settle_api::order_flow_api::OrderFlowApi,
    traits::{CatalogError, CatalogManagement, OrderFlowError, OrderManagement, PaymentGateway, UserDirectory},
};

/// `PaymentApi` starts gateway payments for existing orders.
///
/// The gateway is called exactly once per checkout. If it fails, the order stays in `pending_payment` and the buyer
/// can retry checkout with the same order id. Every attempt is recorded, so notifications for an abandoned attempt
/// still resolve to the order.
pub struct PaymentApi<B, G> {
    flow: OrderFlowApi<B>,
    gateway: G,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, G> PaymentApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { flow: OrderFlowApi::new(db, producers), gateway }
    }

    pub fn db(&self) -> &B {
        self.flow.db()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: OrderManagement + CatalogManagement + UserDirectory,
    G: PaymentGateway,
{
    pub async fn checkout(
        &self,
        buyer_id: i64,
        order_id: i64,
        details: PaymentDetails,
    ) -> Result<CheckoutResult, OrderFlowError> {
        let method = details.method();
        let order = self.flow.db().fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.buyer_id != buyer_id {
            return Err(OrderFlowError::NotOrderParticipant { user_id: buyer_id, order_id });
        }
        if order.status != OrderStatusType::PendingPayment {
            return Err(OrderFlowError::CheckoutNotAllowed {
                order_id,
                method,
                reason: format!("The order is {}", order.status),
            });
        }
        let address = self.billing_address(&order, method.requires_address()).await?;
        let buyer = self
            .flow
            .db()
            .fetch_user(buyer_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::UserNotFound(buyer_id)))?;
        let request = PaymentRequest::for_order(&order, PayerProfile::from_user(&buyer, address), details);
        debug!("🔄️ Requesting {method} payment of {} for order {}", request.amount, order.order_number);
        let handle = self.gateway.create_payment(request).await.map_err(|e| {
            warn!("🔄️ {method} payment for order {} failed at the gateway. {e}", order.order_number);
            e
        })?;
        info!(
            "🔄️ Gateway payment {} ({}) created for order {}",
            handle.payment_id, handle.status, order.order_number
        );
        let order = self.flow.db().record_payment_attempt(order.id, &handle.payment_id, method).await?;
        // Card payments are usually decided synchronously and get the same treatment as a webhook would.
        let order = self.flow.apply_payment_status(order, handle.status.normalize()).await?.into_order();
        Ok(CheckoutResult { order, payment: handle })
    }

    /// Live gateway status for a payment the user is a party to.
    pub async fn payment_status(
        &self,
        user_id: i64,
        payment_id: &str,
        can_read_all: bool,
    ) -> Result<GatewayPayment, OrderFlowError> {
        let order = self
            .flow
            .db()
            .fetch_order_by_payment_id(payment_id)
            .await?
            .ok_or_else(|| OrderFlowError::PaymentNotLinked(payment_id.to_string()))?;
        if !can_read_all && !order.is_participant(user_id) {
            return Err(OrderFlowError::NotOrderParticipant { user_id, order_id: order.id });
        }
        Ok(self.gateway.fetch_payment(payment_id).await?)
    }

    async fn billing_address(&self, order: &Order, required: bool) -> Result<Option<Address>, OrderFlowError> {
        let Some(address_id) = order.shipping_address_id else {
            if required {
                return Err(OrderFlowError::InvalidAddress("This payment method requires a billing address".into()));
            }
            return Ok(None);
        };
        match self.flow.db().fetch_address(address_id).await? {
            Some(address) if address.user_id == order.buyer_id => Ok(Some(address)),
            _ if !required => Ok(None),
            _ => Err(OrderFlowError::InvalidAddress(format!("Address {address_id} is not valid for this order"))),
        }
    }
}
