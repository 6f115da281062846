use std::fmt::Debug;

use chrono::Utc;

use crate::{
    db_types::{Order, OrderStatusType},
    helpers::month_start,
    order_objects::{OrderQueryFilter, SalesStats},
    traits::{OrderFlowError, OrderManagement},
};

/// `AccountApi` provides read access to a user's purchases and sales.
pub struct AccountApi<B> {
    db: B,
}

impl<B> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi")
    }
}

impl<B> AccountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AccountApi<B>
where B: OrderManagement
{
    /// The buyer's orders, optionally only those in `status`.
    pub async fn purchases(&self, buyer_id: i64, status: Option<OrderStatusType>) -> Result<Vec<Order>, OrderFlowError> {
        let query = OrderQueryFilter::default().with_buyer_id(buyer_id);
        self.db.search_orders(with_optional_status(query, status)).await
    }

    pub async fn sales(&self, seller_id: i64, status: Option<OrderStatusType>) -> Result<Vec<Order>, OrderFlowError> {
        let query = OrderQueryFilter::default().with_seller_id(seller_id);
        self.db.search_orders(with_optional_status(query, status)).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(query).await
    }

    /// A single order, visible to its buyer and seller, or to anyone with read-all access.
    pub async fn order_for_user(&self, user_id: i64, order_id: i64, can_read_all: bool) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if !can_read_all && !order.is_participant(user_id) {
            return Err(OrderFlowError::NotOrderParticipant { user_id, order_id });
        }
        Ok(order)
    }

    pub async fn monthly_sales_stats(&self, seller_id: i64) -> Result<SalesStats, OrderFlowError> {
        self.db.sales_stats(seller_id, month_start(Utc::now())).await
    }
}

fn with_optional_status(query: OrderQueryFilter, status: Option<OrderStatusType>) -> OrderQueryFilter {
    match status {
        Some(status) => query.with_status(status),
        None => query,
    }
}
