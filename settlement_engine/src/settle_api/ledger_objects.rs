use serde::{Deserialize, Serialize};
use settle_common::Cents;

use crate::db_types::{Order, Transaction, TransactionStatus, TransactionType, UserBalance};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQueryFilter {
    pub user_id: Option<i64>,
    pub order_id: Option<i64>,
    pub tx_types: Vec<TransactionType>,
    pub statuses: Vec<TransactionStatus>,
    pub limit: Option<i64>,
}

impl TransactionQueryFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self { user_id: Some(user_id), ..Default::default() }
    }

    pub fn withdrawals() -> Self {
        Self::default().with_type(TransactionType::Withdrawal)
    }

    pub fn with_order_id(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_types.push(tx_type);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.order_id.is_none() && self.tx_types.is_empty() && self.statuses.is_empty()
    }
}

/// The sum of a user's ledger entries, per balance kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub earnings: Cents,
    pub cashback: Cents,
}

impl LedgerTotals {
    pub fn add(&mut self, tx: &Transaction) {
        match tx.tx_type.balance_kind() {
            crate::db_types::BalanceKind::Earnings => self.earnings += tx.amount,
            crate::db_types::BalanceKind::Cashback => self.cashback += tx.amount,
        }
    }
}

impl<'a> FromIterator<&'a Transaction> for LedgerTotals {
    fn from_iter<T: IntoIterator<Item = &'a Transaction>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), |mut totals, tx| {
            totals.add(tx);
            totals
        })
    }
}

/// Result of replaying a user's ledger against their cached balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub user_id: i64,
    pub cached: UserBalance,
    pub replayed: LedgerTotals,
    pub consistent: bool,
}

impl LedgerVerification {
    pub fn new(cached: UserBalance, replayed: LedgerTotals) -> Self {
        let consistent = cached.balance == replayed.earnings && cached.cashback_balance == replayed.cashback;
        Self { user_id: cached.user_id, cached, replayed, consistent }
    }
}

/// The ledger entries written when an order completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub order: Order,
    pub sale: Transaction,
    pub cashback: Option<Transaction>,
}

/// A resolved withdrawal and, for rejections, the entry that restored the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResolution {
    pub withdrawal: Transaction,
    pub reversal: Option<Transaction>,
}

impl WithdrawalResolution {
    pub fn is_approved(&self) -> bool {
        self.withdrawal.status == TransactionStatus::Approved
    }
}
