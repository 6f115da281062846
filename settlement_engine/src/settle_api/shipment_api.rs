use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{NewShippingLabel, Order, OrderStatusType, OrderTransition, ShippingLabel, UserProfile},
    events::{EventProducers, NotificationEvent, OrderSettledEvent, OrderShippedEvent},
    helpers::normalize_tracking_code,
    ledger_objects::Settlement,
    order_objects::{Actor, SweepResult},
    settle_api::{commission_policy::CommissionPolicy, notifications},
    shipping_objects::{
        fallback_shipping_options,
        LabelParty,
        LabelRequest,
        PackageDimensions,
        ShippingQuoteRequest,
        ShippingQuotes,
        TrackingInfo,
    },
    traits::{
        CatalogError,
        CatalogManagement,
        LabelManagement,
        LedgerManagement,
        OrderFlowError,
        OrderManagement,
        ShippingAggregator,
        UserDirectory,
    },
};

/// `ShipmentApi` drives a paid order through shipping, delivery and completion.
///
/// Completion is the only step that credits the ledger. It happens when the buyer confirms receipt, when an admin
/// releases the funds, or automatically once a delivered order has been held for the configured period.
pub struct ShipmentApi<B> {
    db: B,
    producers: EventProducers,
    policy: CommissionPolicy,
}

impl<B> Debug for ShipmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShipmentApi")
    }
}

impl<B> ShipmentApi<B> {
    pub fn new(db: B, producers: EventProducers, policy: CommissionPolicy) -> Self {
        Self { db, producers, policy }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Quotes shipping options for a parcel. If the aggregator cannot be reached, or returns nothing usable, the
    /// fixed fallback table is used instead.
    pub async fn calculate_shipping<S: ShippingAggregator>(
        &self,
        aggregator: &S,
        request: ShippingQuoteRequest,
    ) -> ShippingQuotes {
        let declared_value = request.declared_value;
        match aggregator.quote(request).await {
            Ok(options) if !options.is_empty() => ShippingQuotes::new(options, false),
            Ok(_) => {
                debug!("📦️ The shipping aggregator returned no options. Using the fallback table");
                ShippingQuotes::new(fallback_shipping_options(declared_value), true)
            },
            Err(e) => {
                warn!("📦️ Shipping quote failed, using the fallback table. {e}");
                ShippingQuotes::new(fallback_shipping_options(declared_value), true)
            },
        }
    }

    pub async fn track<S: ShippingAggregator>(
        &self,
        aggregator: &S,
        tracking_code: &str,
    ) -> Result<TrackingInfo, OrderFlowError> {
        let code = normalize_tracking_code(tracking_code).ok_or(OrderFlowError::MissingTrackingCode)?;
        let info = aggregator.track(&code).await?;
        Ok(info)
    }
}

/// Postage labels. Sellers buy a label once the order is paid, and may cancel it until the parcel is handed over.
impl<B> ShipmentApi<B>
where B: OrderManagement + UserDirectory + CatalogManagement + LabelManagement
{
    /// Buys a label for the order with the aggregator service the seller picked from a quote.
    ///
    /// The parcel goes from the seller's first registered address to the order's shipping address.
    pub async fn purchase_label<S: ShippingAggregator>(
        &self,
        aggregator: &S,
        actor: Actor,
        order_id: i64,
        service_id: i64,
    ) -> Result<ShippingLabel, OrderFlowError> {
        let order = self.label_order(&actor, order_id).await?;
        if order.status != OrderStatusType::PendingShipment {
            return Err(OrderFlowError::LabelNotAllowed { order_id, status: order.status });
        }
        if self.db.fetch_shipping_label(order_id).await?.is_some() {
            return Err(OrderFlowError::LabelAlreadyPurchased(order_id));
        }
        let request = self.label_request(&order, service_id).await?;
        let purchased = aggregator.purchase_label(request).await?;
        let label = NewShippingLabel {
            order_id,
            label_id: purchased.label_id.clone(),
            service_id,
            protocol: purchased.protocol,
            price: purchased.price,
        };
        match self.db.insert_shipping_label(label).await {
            Ok(label) => {
                info!("📦️ Label {} ({}) bought for order {}", label.label_id, label.price, order.order_number);
                Ok(label)
            },
            Err(e) => {
                // Another request stored a label first. Do not leave a second one paid for at the aggregator.
                warn!("📦️ Could not store label {} for order {}. {e}", purchased.label_id, order.order_number);
                if let Err(ce) = aggregator.cancel_label(&purchased.label_id).await {
                    error!("📦️ Label {} is orphaned and must be cancelled by hand. {ce}", purchased.label_id);
                }
                Err(e)
            },
        }
    }

    pub async fn label_url<S: ShippingAggregator>(
        &self,
        aggregator: &S,
        actor: Actor,
        order_id: i64,
    ) -> Result<String, OrderFlowError> {
        self.label_order(&actor, order_id).await?;
        let label = self.db.fetch_shipping_label(order_id).await?.ok_or(OrderFlowError::NoShippingLabel(order_id))?;
        let url = aggregator.label_url(&label.label_id).await?;
        Ok(url)
    }

    /// Cancels the order's label with the aggregator, as long as the parcel has not been handed over yet.
    pub async fn cancel_label<S: ShippingAggregator>(
        &self,
        aggregator: &S,
        actor: Actor,
        order_id: i64,
    ) -> Result<ShippingLabel, OrderFlowError> {
        let order = self.label_order(&actor, order_id).await?;
        if matches!(
            order.status,
            OrderStatusType::Shipped | OrderStatusType::InTransit | OrderStatusType::Delivered | OrderStatusType::Completed
        ) {
            return Err(OrderFlowError::LabelNotAllowed { order_id, status: order.status });
        }
        let label = self.db.fetch_shipping_label(order_id).await?.ok_or(OrderFlowError::NoShippingLabel(order_id))?;
        aggregator.cancel_label(&label.label_id).await?;
        let cancelled =
            self.db.cancel_shipping_label(label.id).await?.ok_or(OrderFlowError::NoShippingLabel(order_id))?;
        info!("📦️ Label {} of order {} cancelled", cancelled.label_id, order.order_number);
        Ok(cancelled)
    }

    /// Labels are the seller's business. Admins may act on any order.
    async fn label_order(&self, actor: &Actor, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if !(actor.is_seller_of(&order) || matches!(actor, Actor::Admin)) {
            return Err(OrderFlowError::NotOrderParticipant { user_id: actor.user_id().unwrap_or_default(), order_id });
        }
        Ok(order)
    }

    async fn label_request(&self, order: &Order, service_id: i64) -> Result<LabelRequest, OrderFlowError> {
        let seller = self.fetch_user(order.seller_id).await?;
        let buyer = self.fetch_user(order.buyer_id).await?;
        let origin = self.db.fetch_default_address(seller.id).await?.ok_or_else(|| {
            OrderFlowError::InvalidAddress(format!("Seller #{} has not registered a shipping origin", seller.id))
        })?;
        let address_id = order
            .shipping_address_id
            .ok_or_else(|| OrderFlowError::InvalidAddress(format!("Order {} has no shipping address", order.id)))?;
        let destination = self
            .db
            .fetch_address(address_id)
            .await?
            .ok_or_else(|| OrderFlowError::InvalidAddress(format!("Address {address_id} does not exist")))?;
        let product = self
            .db
            .fetch_product(order.product_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::ProductNotFound(order.product_id)))?;
        Ok(LabelRequest {
            service_id,
            order_number: order.order_number.to_string(),
            from: LabelParty::new(&seller, &origin),
            to: LabelParty::new(&buyer, &destination),
            product_title: product.title,
            declared_value: order.product_price,
            package: PackageDimensions::default(),
        })
    }

    async fn fetch_user(&self, user_id: i64) -> Result<UserProfile, OrderFlowError> {
        let user = self.db.fetch_user(user_id).await?.ok_or(CatalogError::UserNotFound(user_id))?;
        Ok(user)
    }
}

impl<B> ShipmentApi<B>
where B: OrderManagement + LedgerManagement + UserDirectory
{
    /// The seller hands the parcel to a carrier. Only valid from `pending_shipment`.
    pub async fn mark_shipped(
        &self,
        actor: Actor,
        order_id: i64,
        tracking_code: &str,
        carrier: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let code = normalize_tracking_code(tracking_code).ok_or(OrderFlowError::MissingTrackingCode)?;
        let order = self.fetch(order_id).await?;
        if !actor.is_seller_of(&order) {
            return Err(OrderFlowError::NotOrderParticipant { user_id: actor.user_id().unwrap_or_default(), order_id });
        }
        let order = self.transition(order, OrderTransition::shipped(code, carrier)).await?;
        info!("📦️ Order {} shipped with tracking code {:?}", order.order_number, order.tracking_code);
        self.producers.publish_notification(NotificationEvent::from(notifications::order_shipped(&order))).await;
        self.producers.publish_order_shipped(OrderShippedEvent { order: order.clone() }).await;
        Ok(order)
    }

    /// The carrier reports the parcel on its way. Accepted from the seller or the tracking sync.
    pub async fn mark_in_transit(&self, actor: Actor, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch(order_id).await?;
        if !(actor.is_seller_of(&order) || actor.is_privileged()) {
            return Err(OrderFlowError::NotOrderParticipant { user_id: actor.user_id().unwrap_or_default(), order_id });
        }
        let order = self.transition(order, OrderTransition::to(OrderStatusType::InTransit)).await?;
        debug!("📦️ Order {} is in transit", order.order_number);
        Ok(order)
    }

    /// Delivery confirmed by the carrier, the buyer, the seller or an admin.
    pub async fn mark_delivered(&self, actor: Actor, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch(order_id).await?;
        if !(order.is_participant(actor.user_id().unwrap_or_default()) || actor.is_privileged()) {
            return Err(OrderFlowError::NotOrderParticipant { user_id: actor.user_id().unwrap_or_default(), order_id });
        }
        let order = self.transition(order, OrderTransition::to(OrderStatusType::Delivered)).await?;
        info!("📦️ Order {} delivered", order.order_number);
        self.producers.publish_notification(NotificationEvent::from(notifications::order_delivered(&order))).await;
        Ok(order)
    }

    /// Releases the funds for an order.
    ///
    /// The buyer may confirm receipt as soon as the order has shipped, which records the delivery first. Admins and
    /// the hold sweep may only complete orders that are already delivered. Sellers can never complete their own
    /// sales.
    pub async fn mark_completed(&self, actor: Actor, order_id: i64) -> Result<Settlement, OrderFlowError> {
        let mut order = self.fetch(order_id).await?;
        let is_buyer = actor.is_buyer_of(&order);
        if !(is_buyer || actor.is_privileged()) {
            return Err(OrderFlowError::NotOrderParticipant { user_id: actor.user_id().unwrap_or_default(), order_id });
        }
        if is_buyer && matches!(order.status, OrderStatusType::Shipped | OrderStatusType::InTransit) {
            debug!("📦️ Buyer confirmed receipt of order {} before the carrier did", order.order_number);
            order = self.transition(order, OrderTransition::to(OrderStatusType::Delivered)).await?;
        }
        if order.status != OrderStatusType::Delivered {
            return Err(OrderFlowError::InvalidTransition {
                order_id,
                from: order.status,
                to: OrderStatusType::Completed,
            });
        }
        let buyer = self
            .db
            .fetch_user(order.buyer_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::UserNotFound(order.buyer_id)))?;
        let cashback = self.policy.cashback_for(buyer.subscription_tier, order.product_price);
        let Some(settlement) = self.db.settle_order(order_id, cashback).await? else {
            let current = self.fetch(order_id).await?;
            return Err(OrderFlowError::InvalidTransition {
                order_id,
                from: current.status,
                to: OrderStatusType::Completed,
            });
        };
        info!(
            "📦️💰️ Order {} completed. {} credited to seller #{}, {} cashback to buyer #{}",
            settlement.order.order_number, settlement.sale.amount, settlement.order.seller_id, cashback, buyer.id
        );
        for notification in notifications::order_settled(&settlement) {
            self.producers.publish_notification(NotificationEvent::from(notification)).await;
        }
        let event = OrderSettledEvent {
            order: settlement.order.clone(),
            sale: settlement.sale.clone(),
            cashback: settlement.cashback.clone(),
        };
        self.producers.publish_order_settled(event).await;
        Ok(settlement)
    }

    /// Completes every order that has been delivered for longer than `hold`.
    pub async fn complete_delivered_orders(&self, hold: Duration) -> Result<SweepResult, OrderFlowError> {
        let cutoff = Utc::now() - hold;
        let due = self.db.fetch_delivered_orders_older_than(cutoff).await?;
        let mut result = SweepResult::default();
        for order in due {
            match self.mark_completed(Actor::System, order.id).await {
                Ok(settlement) => result.changed.push(settlement.order),
                Err(e) => {
                    warn!("📦️ Could not auto-complete order {}. {e}", order.order_number);
                    result.skipped += 1;
                },
            }
        }
        Ok(result)
    }

    /// Polls the carrier for every order still on its way and records progress.
    pub async fn sync_tracking<S: ShippingAggregator>(&self, aggregator: &S) -> Result<SweepResult, OrderFlowError> {
        let moving = self.db.fetch_orders_in_transit().await?;
        let mut result = SweepResult::default();
        for order in moving {
            let Some(code) = order.tracking_code.as_deref() else {
                result.skipped += 1;
                continue;
            };
            let info = match aggregator.track(code).await {
                Ok(info) => info,
                Err(e) => {
                    debug!("📦️ Tracking lookup for {code} failed. {e}");
                    result.skipped += 1;
                    continue;
                },
            };
            let outcome = if info.is_delivered() {
                Some(self.mark_delivered(Actor::System, order.id).await)
            } else if info.is_in_transit() && order.status == OrderStatusType::Shipped {
                Some(self.mark_in_transit(Actor::System, order.id).await)
            } else {
                None
            };
            match outcome {
                Some(Ok(updated)) => result.changed.push(updated),
                Some(Err(e)) => {
                    warn!("📦️ Could not apply tracking update for order {}. {e}", order.order_number);
                    result.skipped += 1;
                },
                None => result.skipped += 1,
            }
        }
        Ok(result)
    }

    async fn fetch(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    /// Applies a transition that the caller expects to be legal, failing with `InvalidTransition` otherwise.
    async fn transition(&self, order: Order, transition: OrderTransition) -> Result<Order, OrderFlowError> {
        let target = transition.target;
        if !order.status.can_transition_to(target) {
            return Err(OrderFlowError::InvalidTransition { order_id: order.id, from: order.status, to: target });
        }
        match self.db.transition_order(order.id, transition).await? {
            Some(updated) => Ok(updated),
            None => {
                let current = self.fetch(order.id).await?;
                Err(OrderFlowError::InvalidTransition { order_id: order.id, from: current.status, to: target })
            },
        }
    }
}
