use std::fmt::Debug;

use log::*;
use settle_common::Cents;

use crate::{
    db_types::{NewTransaction, Transaction, TransactionType, UserBalance},
    ledger_objects::{LedgerVerification, TransactionQueryFilter},
    traits::{LedgerError, LedgerManagement},
};

/// `LedgerApi` is the programmatic face of the ledger: credits, debits, balances and replay checks.
///
/// Order settlement and withdrawals have their own flows ([`crate::ShipmentApi`] and [`crate::WithdrawalApi`]) that
/// write their entries atomically with the related order or withdrawal change.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub async fn credit(
        &self,
        user_id: i64,
        amount: Cents,
        tx_type: TransactionType,
        order_id: Option<i64>,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidEntry(format!("Credits must be positive, got {amount}")));
        }
        if tx_type.is_debit() {
            return Err(LedgerError::InvalidEntry(format!("{tx_type} entries cannot be credits")));
        }
        let mut entry = NewTransaction::new(user_id, tx_type, amount, description);
        entry.order_id = order_id;
        let tx = self.db.post_entry(entry).await?;
        debug!("💰️ Credited {amount} ({tx_type}) to user #{user_id}. Entry #{}", tx.id);
        Ok(tx)
    }

    /// Debits `amount` (a positive number) from the user's earnings. Only withdrawals debit the ledger.
    pub async fn debit(
        &self,
        user_id: i64,
        amount: Cents,
        tx_type: TransactionType,
        order_id: Option<i64>,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidEntry(format!("Debit amounts must be positive, got {amount}")));
        }
        if !tx_type.is_debit() {
            return Err(LedgerError::InvalidEntry(format!("{tx_type} entries cannot be debits")));
        }
        let mut entry = NewTransaction::new(user_id, tx_type, -amount, description);
        entry.order_id = order_id;
        let tx = self.db.post_entry(entry).await?;
        debug!("💰️ Debited {amount} ({tx_type}) from user #{user_id}. Entry #{}", tx.id);
        Ok(tx)
    }

    pub async fn balance(&self, user_id: i64) -> Result<UserBalance, LedgerError> {
        self.db.fetch_balance(user_id).await?.ok_or(LedgerError::UserNotFound(user_id))
    }

    pub async fn transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError> {
        self.db.search_transactions(query).await
    }

    /// Replays every entry for the user and compares the sums with the cached balances.
    pub async fn verify(&self, user_id: i64) -> Result<LedgerVerification, LedgerError> {
        let cached = self.balance(user_id).await?;
        let replayed = self.db.ledger_totals(user_id).await?;
        let result = LedgerVerification::new(cached, replayed);
        if !result.consistent {
            error!(
                "💰️ Ledger for user #{user_id} does not match cached balances. Cached {}/{}, replayed {}/{}",
                cached.balance, cached.cashback_balance, replayed.earnings, replayed.cashback
            );
        }
        Ok(result)
    }
}
