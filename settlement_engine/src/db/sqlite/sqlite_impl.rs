//! `SqliteDatabase` is the SQLite implementation of the settlement engine backend.
//!
//! It implements every trait in [`crate::traits`]. Each trait method either runs a single statement on a pooled
//! connection, or composes several of the low-level functions inside one database transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use settle_common::Cents;
use sqlx::{SqliteConnection, SqlitePool};

use super::{
    db_url,
    is_check_violation,
    is_unique_violation,
    labels,
    ledger,
    new_pool,
    notifications,
    orders,
    products,
    users,
    webhook_queue,
};
use crate::{
    db_types::{
        Address,
        BalanceKind,
        NewNotification,
        NewOrder,
        NewShippingLabel,
        NewTransaction,
        Notification,
        Order,
        OrderNumber,
        OrderStatusType,
        OrderTransition,
        PaymentMethod,
        Product,
        RetryStatus,
        ShippingLabel,
        Transaction,
        TransactionStatus,
        TransactionType,
        UserBalance,
        UserProfile,
        WebhookRetry,
    },
    ledger_objects::{LedgerTotals, Settlement, TransactionQueryFilter, WithdrawalResolution},
    order_objects::{OrderQueryFilter, SalesStats},
    traits::{
        CatalogError,
        CatalogManagement,
        LabelManagement,
        LedgerError,
        LedgerManagement,
        MarketplaceDatabase,
        NotificationManagement,
        OrderFlowError,
        OrderManagement,
        UserDirectory,
        WebhookQueue,
        WebhookQueueError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

/// Appends a ledger entry and moves the matching cached balance by the same amount.
///
/// The balance update is conditional, so a debit that would overdraw the balance fails with `InsufficientBalance`
/// and, because the caller's transaction is dropped, nothing is written.
async fn append_entry(entry: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let kind = entry.tx_type.balance_kind();
    let user_id = entry.user_id;
    let delta = entry.amount;
    if users::adjust_balance(user_id, kind, delta, &mut *conn).await?.is_none() {
        let balance = users::fetch_balance(user_id, &mut *conn).await?.ok_or(LedgerError::UserNotFound(user_id))?;
        let available = match kind {
            BalanceKind::Earnings => balance.balance,
            BalanceKind::Cashback => balance.cashback_balance,
        };
        return Err(LedgerError::InsufficientBalance { requested: -delta, available });
    }
    let tx = ledger::insert_transaction(entry, conn).await.map_err(|e| {
        if is_unique_violation(&e) || is_check_violation(&e) {
            LedgerError::InvalidEntry(e.to_string())
        } else {
            LedgerError::from(e)
        }
    })?;
    trace!("💰️ Ledger entry #{} ({}) of {} for user #{user_id}", tx.id, tx.tx_type, tx.amount);
    Ok(tx)
}

impl OrderManagement for SqliteDatabase {
    /// Reserves the product and inserts the order in a single transaction. If the product is no longer active, or the
    /// order number is taken, nothing is written.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let product_id = order.product_id;
        if !products::reserve_product(product_id, &mut tx).await? {
            debug!("🗃️ Product {product_id} is no longer available");
            return Err(OrderFlowError::ProductUnavailable(product_id));
        }
        let number = order.order_number.clone();
        let order = orders::insert_order(order, &mut tx).await.map_err(|e| {
            if is_unique_violation(&e) {
                OrderFlowError::OrderNumberCollision(number)
            } else {
                OrderFlowError::from(e)
            }
        })?;
        tx.commit().await?;
        debug!("🗃️ Order {} saved with id {} and product {product_id} reserved", order.order_number, order.id);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_id(payment_id, &mut conn).await?;
        Ok(order)
    }

    async fn record_payment_attempt(
        &self,
        order_id: i64,
        payment_id: &str,
        method: PaymentMethod,
    ) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::record_payment_attempt(order_id, payment_id, method, &mut tx)
            .await?
            .ok_or(OrderFlowError::OrderNotFound(order_id))?;
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} ({method}) recorded against order {}", order.order_number);
        Ok(order)
    }

    /// Applies the transition and, when the target hands the product back, releases it in the same transaction.
    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let target = transition.target;
        let Some(order) = orders::transition_order(order_id, transition, &mut tx).await? else {
            trace!("🗃️ Order {order_id} was not in a state that can move to {target}");
            return Ok(None);
        };
        if target.releases_product() {
            let released = products::release_product(order.product_id, &mut tx).await?;
            debug!("🗃️ Product {} released: {released}", order.product_id);
        }
        tx.commit().await?;
        debug!("🗃️ Order {} is now {}", order.order_number, order.status);
        Ok(Some(order))
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_unpaid_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unpaid_orders_older_than(cutoff, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_delivered_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_delivered_orders_older_than(cutoff, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_in_transit(&self) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_in_transit(&mut conn).await?;
        Ok(orders)
    }

    async fn sales_stats(&self, seller_id: i64, since: DateTime<Utc>) -> Result<SalesStats, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::sales_stats(seller_id, since, &mut conn).await?;
        Ok(stats)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn remove_product_from_carts(&self, product_id: i64) -> Result<u64, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let removed = products::remove_product_from_carts(product_id, &mut conn).await?;
        trace!("🗃️ Product {product_id} removed from {removed} carts");
        Ok(removed)
    }
}

impl UserDirectory for SqliteDatabase {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserProfile>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let address = users::fetch_address(address_id, &mut conn).await?;
        Ok(address)
    }

    async fn fetch_default_address(&self, user_id: i64) -> Result<Option<Address>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let address = users::fetch_default_address(user_id, &mut conn).await?;
        Ok(address)
    }
}

impl LabelManagement for SqliteDatabase {
    async fn insert_shipping_label(&self, label: NewShippingLabel) -> Result<ShippingLabel, OrderFlowError> {
        let order_id = label.order_id;
        let mut conn = self.pool.acquire().await?;
        let label = labels::insert_label(label, &mut conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                OrderFlowError::LabelAlreadyPurchased(order_id)
            } else {
                OrderFlowError::from(e)
            }
        })?;
        debug!("📦️ Label {} stored for order #{order_id}", label.label_id);
        Ok(label)
    }

    async fn fetch_shipping_label(&self, order_id: i64) -> Result<Option<ShippingLabel>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let label = labels::fetch_live_label(order_id, &mut conn).await?;
        Ok(label)
    }

    async fn cancel_shipping_label(&self, id: i64) -> Result<Option<ShippingLabel>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let label = labels::cancel_label(id, &mut conn).await?;
        Ok(label)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn post_entry(&self, entry: NewTransaction) -> Result<Transaction, LedgerError> {
        if entry.amount.value() == 0 || entry.tx_type.is_debit() != entry.amount.is_negative() {
            return Err(LedgerError::InvalidEntry(format!(
                "A {} entry cannot have an amount of {}",
                entry.tx_type, entry.amount
            )));
        }
        let mut tx = self.pool.begin().await?;
        let entry = append_entry(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let balance = users::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_transaction(&self, tx_id: i64) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let tx = ledger::fetch_transaction(tx_id, &mut conn).await?;
        Ok(tx)
    }

    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::search_transactions(query, &mut conn).await?;
        Ok(entries)
    }

    async fn ledger_totals(&self, user_id: i64) -> Result<LedgerTotals, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let totals = ledger::ledger_totals(user_id, &mut conn).await?;
        Ok(totals)
    }

    /// Completes a delivered order and credits the seller (and the buyer's cashback, if any) atomically.
    ///
    /// Returns `None` without writing anything if the order is not `delivered`, which is what makes settlement happen
    /// at most once.
    async fn settle_order(&self, order_id: i64, cashback: Cents) -> Result<Option<Settlement>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        // The conditional update comes first so that the transaction holds the write lock from the start
        let completed = OrderTransition::to(OrderStatusType::Completed);
        let Some(order) = orders::transition_order(order_id, completed, &mut tx).await? else {
            if orders::fetch_order(order_id, &mut tx).await?.is_none() {
                return Err(LedgerError::OrderNotFound(order_id));
            }
            debug!("💰️ Order {order_id} is not awaiting settlement");
            return Ok(None);
        };
        let sale = NewTransaction::new(
            order.seller_id,
            TransactionType::Sale,
            order.seller_receives,
            format!("Venda - Pedido #{}", order.order_number),
        )
        .for_order(order.id);
        let sale = append_entry(sale, &mut tx).await?;
        let cashback = if cashback.is_positive() {
            let entry = NewTransaction::new(
                order.buyer_id,
                TransactionType::Cashback,
                cashback,
                format!("Cashback - Pedido #{}", order.order_number),
            )
            .for_order(order.id);
            Some(append_entry(entry, &mut tx).await?)
        } else {
            None
        };
        users::incr_total_sales(order.seller_id, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ Order {} settled. Sale entry #{}", order.order_number, sale.id);
        Ok(Some(Settlement { order, sale, cashback }))
    }

    async fn request_withdrawal(&self, user_id: i64, amount: Cents) -> Result<Transaction, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidEntry(format!("Cannot withdraw {amount}")));
        }
        let entry = NewTransaction::new(user_id, TransactionType::Withdrawal, -amount, "Saque solicitado");
        let mut tx = self.pool.begin().await?;
        let withdrawal = append_entry(entry, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ User #{user_id} requested a withdrawal of {amount} (#{})", withdrawal.id);
        Ok(withdrawal)
    }

    /// Approves or rejects a pending withdrawal. A rejection writes the reversal in the same transaction.
    async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<WithdrawalResolution, LedgerError> {
        let status = if approve { TransactionStatus::Approved } else { TransactionStatus::Rejected };
        let mut tx = self.pool.begin().await?;
        // The conditional update comes first so that the transaction holds the write lock from the start
        let Some(withdrawal) = ledger::resolve_pending_withdrawal(withdrawal_id, status, &mut tx).await? else {
            let existing = ledger::fetch_transaction(withdrawal_id, &mut tx)
                .await?
                .filter(|t| t.tx_type == TransactionType::Withdrawal);
            return match existing {
                Some(_) => Err(LedgerError::WithdrawalAlreadyResolved(withdrawal_id)),
                None => Err(LedgerError::WithdrawalNotFound(withdrawal_id)),
            };
        };
        let reversal = if approve {
            None
        } else {
            let entry = NewTransaction::new(
                withdrawal.user_id,
                TransactionType::WithdrawalReversal,
                -withdrawal.amount,
                format!("Estorno do saque #{withdrawal_id}"),
            )
            .with_reference(withdrawal_id);
            Some(append_entry(entry, &mut tx).await?)
        };
        tx.commit().await?;
        info!("💰️ Withdrawal #{withdrawal_id} {status}");
        Ok(WithdrawalResolution { withdrawal, reversal })
    }
}

impl WebhookQueue for SqliteDatabase {
    async fn enqueue_retry(
        &self,
        notification_id: &str,
        payment_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<WebhookRetry, WebhookQueueError> {
        let mut conn = self.pool.acquire().await?;
        let retry = webhook_queue::enqueue_retry(notification_id, payment_id, error, next_attempt_at, &mut conn).await?;
        debug!("🪝️ Notification {notification_id} queued for retry #{} at {}", retry.id, retry.next_attempt_at);
        Ok(retry)
    }

    async fn fetch_due_retries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<WebhookRetry>, WebhookQueueError> {
        let mut conn = self.pool.acquire().await?;
        let retries = webhook_queue::fetch_due_retries(now, limit, &mut conn).await?;
        Ok(retries)
    }

    async fn mark_retry_done(&self, retry_id: i64) -> Result<(), WebhookQueueError> {
        let mut conn = self.pool.acquire().await?;
        if webhook_queue::mark_retry_done(retry_id, &mut conn).await? {
            Ok(())
        } else {
            Err(WebhookQueueError::RetryNotFound(retry_id))
        }
    }

    async fn record_retry_failure(
        &self,
        retry_id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<RetryStatus, WebhookQueueError> {
        let mut conn = self.pool.acquire().await?;
        webhook_queue::record_retry_failure(retry_id, error, next_attempt_at, max_attempts, &mut conn)
            .await?
            .ok_or(WebhookQueueError::RetryNotFound(retry_id))
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let notification = notifications::insert_notification(notification, &mut conn).await?;
        trace!("🗃️ Notification #{} stored for user #{}", notification.id, notification.user_id);
        Ok(notification)
    }

    async fn fetch_notifications(&self, user_id: i64) -> Result<Vec<Notification>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let notifications = notifications::fetch_notifications(user_id, &mut conn).await?;
        Ok(notifications)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), CatalogError> {
        self.pool.close().await;
        Ok(())
    }
}
