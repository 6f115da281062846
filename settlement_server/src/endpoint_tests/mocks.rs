use chrono::{DateTime, Utc};
use mockall::mock;
use settle_common::Cents;
use settlement_engine::{
    db_types::{NewOrder, NewTransaction, Order, OrderNumber, OrderTransition, PaymentMethod, Transaction, UserBalance},
    ledger_objects::{LedgerTotals, Settlement, TransactionQueryFilter, WithdrawalResolution},
    order_objects::{OrderQueryFilter, SalesStats},
    traits::{LedgerError, LedgerManagement, OrderFlowError, OrderManagement},
};

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, OrderFlowError>;
        async fn record_payment_attempt(&self, order_id: i64, payment_id: &str, method: PaymentMethod) -> Result<Order, OrderFlowError>;
        async fn transition_order(&self, order_id: i64, transition: OrderTransition) -> Result<Option<Order>, OrderFlowError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_unpaid_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_delivered_orders_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_orders_in_transit(&self) -> Result<Vec<Order>, OrderFlowError>;
        async fn sales_stats(&self, seller_id: i64, since: DateTime<Utc>) -> Result<SalesStats, OrderFlowError>;
    }
}

mock! {
    pub LedgerManager {}
    impl LedgerManagement for LedgerManager {
        async fn post_entry(&self, entry: NewTransaction) -> Result<Transaction, LedgerError>;
        async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError>;
        async fn fetch_transaction(&self, tx_id: i64) -> Result<Option<Transaction>, LedgerError>;
        async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError>;
        async fn ledger_totals(&self, user_id: i64) -> Result<LedgerTotals, LedgerError>;
        async fn settle_order(&self, order_id: i64, cashback: Cents) -> Result<Option<Settlement>, LedgerError>;
        async fn request_withdrawal(&self, user_id: i64, amount: Cents) -> Result<Transaction, LedgerError>;
        async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<WithdrawalResolution, LedgerError>;
    }
}
