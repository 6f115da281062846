use settle_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{NewTransaction, Transaction, UserBalance},
    ledger_objects::{LedgerTotals, Settlement, TransactionQueryFilter, WithdrawalResolution},
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient balance. Requested {requested}, but only {available} is available")]
    InsufficientBalance { requested: Cents, available: Cents },
    #[error("The minimum withdrawal is {minimum}. Requested {requested}")]
    WithdrawalBelowMinimum { requested: Cents, minimum: Cents },
    #[error("Withdrawal {0} does not exist")]
    WithdrawalNotFound(i64),
    #[error("Withdrawal {0} has already been resolved")]
    WithdrawalAlreadyResolved(i64),
    #[error("User {0} does not exist")]
    UserNotFound(i64),
    #[error("Invalid ledger entry. {0}")]
    InvalidEntry(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The ledger: an append-only list of entries, and the cached balances they add up to.
///
/// Every method that writes an entry moves the matching cached balance by exactly the entry amount, in the same
/// database transaction, and refuses any move that would take a balance below zero.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Appends a single entry and applies it to the cached balance. Credits must be positive and withdrawals
    /// negative.
    async fn post_entry(&self, entry: NewTransaction) -> Result<Transaction, LedgerError>;

    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError>;

    async fn fetch_transaction(&self, tx_id: i64) -> Result<Option<Transaction>, LedgerError>;

    /// Most recent first.
    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError>;

    /// Sums every ledger entry for the user, per balance kind.
    async fn ledger_totals(&self, user_id: i64) -> Result<LedgerTotals, LedgerError>;

    /// Completes a `delivered` order and writes its ledger entries in one transaction:
    /// * order `delivered → completed` (conditional),
    /// * `sale` credit of `seller_receives` to the seller, and the seller's sales counter,
    /// * `cashback` credit to the buyer, if `cashback` is positive.
    ///
    /// Returns `None` without writing anything if the order was not `delivered`, which makes completion at most once
    /// per order.
    async fn settle_order(&self, order_id: i64, cashback: Cents) -> Result<Option<Settlement>, LedgerError>;

    /// Debits `amount` from the user's earnings as a `pending` withdrawal entry.
    async fn request_withdrawal(&self, user_id: i64, amount: Cents) -> Result<Transaction, LedgerError>;

    /// Resolves a pending withdrawal. Approval only changes the entry status. Rejection marks the entry `rejected` and
    /// appends a `withdrawal_reversal` credit for the same amount, atomically.
    async fn resolve_withdrawal(&self, withdrawal_id: i64, approve: bool) -> Result<WithdrawalResolution, LedgerError>;
}
