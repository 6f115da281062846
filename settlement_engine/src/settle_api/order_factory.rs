use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::{
    db_types::{NewOrder, Order, PaymentMethod, PriceBreakdown, Product, ProductStatus},
    events::{EventProducers, OrderCreatedEvent},
    helpers::new_order_number,
    settle_api::commission_policy::CommissionPolicy,
    traits::{CatalogError, CatalogManagement, OrderFlowError, OrderManagement, UserDirectory},
};

pub const DEFAULT_SHIPPING_PRICE: Cents = Cents::from_cents(1_500);
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// The shipping option the buyer picked from a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingChoice {
    pub service: String,
    pub price: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer_id: i64,
    pub product_id: i64,
    pub address_id: Option<i64>,
    pub payment_method: PaymentMethod,
    pub shipping: Option<ShippingChoice>,
}

/// What the buyer would pay for a product, and what the seller would receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePreview {
    pub breakdown: PriceBreakdown,
    /// A listing price that leaves the seller their asking price after commission.
    pub displayed_price: Option<Cents>,
}

/// `OrderFactoryApi` turns a purchase intent into a `pending_payment` order with a reserved product.
pub struct OrderFactoryApi<B> {
    db: B,
    producers: EventProducers,
    policy: CommissionPolicy,
    default_shipping: Cents,
}

impl<B> Debug for OrderFactoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFactoryApi ({:?}, default shipping {})", self.policy, self.default_shipping)
    }
}

impl<B> OrderFactoryApi<B> {
    pub fn new(db: B, producers: EventProducers, policy: CommissionPolicy) -> Self {
        Self { db, producers, policy, default_shipping: DEFAULT_SHIPPING_PRICE }
    }

    pub fn with_default_shipping(mut self, price: Cents) -> Self {
        self.default_shipping = price;
        self
    }

    pub fn policy(&self) -> &CommissionPolicy {
        &self.policy
    }
}

impl<B> OrderFactoryApi<B>
where B: OrderManagement + CatalogManagement + UserDirectory
{
    /// Validates the purchase, snapshots the seller's commission rate and creates the order.
    ///
    /// The product is reserved in the same database transaction as the order insert. If another buyer reserves the
    /// product first, this call fails with [`OrderFlowError::ProductUnavailable`] and nothing is written.
    pub async fn create_order(&self, request: PurchaseRequest) -> Result<Order, OrderFlowError> {
        let product = self.available_product(request.product_id).await?;
        if product.seller_id == request.buyer_id {
            return Err(OrderFlowError::SelfPurchase);
        }
        self.validate_address(request.buyer_id, request.address_id, request.payment_method).await?;
        let shipping_price = match &request.shipping {
            Some(choice) if choice.price.is_negative() => {
                return Err(OrderFlowError::InvalidShippingPrice(choice.price));
            },
            Some(choice) => choice.price,
            None => self.default_shipping,
        };
        let breakdown = self.breakdown_for(&product, shipping_price).await?;
        let mut new_order = NewOrder {
            order_number: new_order_number(Utc::now()),
            buyer_id: request.buyer_id,
            seller_id: product.seller_id,
            product_id: product.id,
            breakdown,
            payment_method: request.payment_method,
            shipping_address_id: request.address_id,
            shipping_service: request.shipping.map(|s| s.service),
        };
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            match self.db.insert_order(new_order.clone()).await {
                Ok(order) => {
                    info!(
                        "🔄️ Order {} created for product {} (buyer #{}, seller #{}). Total {}, commission {} at {}",
                        order.order_number,
                        order.product_id,
                        order.buyer_id,
                        order.seller_id,
                        order.total_amount,
                        order.commission_amount,
                        order.commission_rate
                    );
                    self.producers.publish_order_created(OrderCreatedEvent { order: order.clone() }).await;
                    return Ok(order);
                },
                Err(OrderFlowError::OrderNumberCollision(number)) => {
                    warn!("🔄️ Order number {number} is taken (attempt {attempt}). Trying another.");
                    new_order.order_number = new_order_number(Utc::now());
                },
                Err(e) => return Err(e),
            }
        }
        Err(OrderFlowError::OrderNumberExhausted(MAX_ORDER_NUMBER_ATTEMPTS))
    }

    /// Prices a product without creating anything.
    pub async fn price_preview(&self, product_id: i64, shipping: Option<Cents>) -> Result<PricePreview, OrderFlowError> {
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::ProductNotFound(product_id)))?;
        let breakdown = self.breakdown_for(&product, shipping.unwrap_or(self.default_shipping)).await?;
        let displayed_price = self.policy.displayed_price(product.price, breakdown.commission_rate);
        Ok(PricePreview { breakdown, displayed_price })
    }

    async fn available_product(&self, product_id: i64) -> Result<Product, OrderFlowError> {
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::ProductNotFound(product_id)))?;
        if product.status != ProductStatus::Active {
            debug!("🔄️ Product {product_id} is {} and cannot be purchased", product.status);
            return Err(OrderFlowError::ProductUnavailable(product_id));
        }
        Ok(product)
    }

    async fn breakdown_for(&self, product: &Product, shipping_price: Cents) -> Result<PriceBreakdown, OrderFlowError> {
        let seller = self
            .db
            .fetch_user(product.seller_id)
            .await?
            .ok_or(OrderFlowError::Catalog(CatalogError::UserNotFound(product.seller_id)))?;
        let rate = self.policy.commission_rate(seller.subscription_tier, seller.promo_type);
        Ok(self.policy.price_breakdown(product.price, shipping_price, rate))
    }

    async fn validate_address(
        &self,
        buyer_id: i64,
        address_id: Option<i64>,
        method: PaymentMethod,
    ) -> Result<(), OrderFlowError> {
        let Some(address_id) = address_id else {
            if method.requires_address() {
                return Err(OrderFlowError::InvalidAddress(format!("{method} payments require a billing address")));
            }
            return Ok(());
        };
        match self.db.fetch_address(address_id).await? {
            Some(address) if address.user_id == buyer_id => Ok(()),
            Some(_) => Err(OrderFlowError::InvalidAddress(format!("Address {address_id} belongs to another user"))),
            None => Err(OrderFlowError::InvalidAddress(format!("Address {address_id} does not exist"))),
        }
    }
}
