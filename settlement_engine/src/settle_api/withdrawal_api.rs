use std::fmt::Debug;

use log::*;
use settle_common::Cents;

use crate::{
    db_types::{Transaction, TransactionStatus},
    events::{EventProducers, NotificationEvent, WithdrawalResolvedEvent},
    ledger_objects::{TransactionQueryFilter, WithdrawalResolution},
    settle_api::notifications,
    traits::{LedgerError, LedgerManagement},
};

pub const DEFAULT_MIN_WITHDRAWAL: Cents = Cents::from_cents(1_000);

/// `WithdrawalApi` handles seller payout requests and their approval by an administrator.
///
/// Requesting a withdrawal debits the balance immediately. Approval leaves the balance alone and emits a
/// [`WithdrawalResolvedEvent`] so that a payout collaborator can send the money. Rejection restores the balance with a
/// reversal entry, atomically with the status change.
pub struct WithdrawalApi<B> {
    db: B,
    producers: EventProducers,
    min_withdrawal: Cents,
}

impl<B> Debug for WithdrawalApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalApi (minimum {})", self.min_withdrawal)
    }
}

impl<B> WithdrawalApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, min_withdrawal: DEFAULT_MIN_WITHDRAWAL }
    }

    pub fn with_minimum(mut self, minimum: Cents) -> Self {
        self.min_withdrawal = minimum;
        self
    }

    pub fn minimum(&self) -> Cents {
        self.min_withdrawal
    }
}

impl<B> WithdrawalApi<B>
where B: LedgerManagement
{
    pub async fn request_withdrawal(&self, user_id: i64, amount: Cents) -> Result<Transaction, LedgerError> {
        if amount < self.min_withdrawal {
            return Err(LedgerError::WithdrawalBelowMinimum { requested: amount, minimum: self.min_withdrawal });
        }
        let tx = self.db.request_withdrawal(user_id, amount).await?;
        info!("💰️ User #{user_id} requested a withdrawal of {amount}. Entry #{}", tx.id);
        Ok(tx)
    }

    pub async fn approve(&self, withdrawal_id: i64) -> Result<WithdrawalResolution, LedgerError> {
        self.resolve(withdrawal_id, true).await
    }

    pub async fn reject(&self, withdrawal_id: i64) -> Result<WithdrawalResolution, LedgerError> {
        self.resolve(withdrawal_id, false).await
    }

    /// Most recent first, optionally filtered by status.
    pub async fn list_withdrawals(&self, status: Option<TransactionStatus>) -> Result<Vec<Transaction>, LedgerError> {
        let mut query = TransactionQueryFilter::withdrawals();
        if let Some(status) = status {
            query = query.with_status(status);
        }
        self.db.search_transactions(query).await
    }

    async fn resolve(&self, withdrawal_id: i64, approve: bool) -> Result<WithdrawalResolution, LedgerError> {
        let resolution = self.db.resolve_withdrawal(withdrawal_id, approve).await?;
        let w = &resolution.withdrawal;
        info!("💰️ Withdrawal #{withdrawal_id} of {} for user #{} is now {}", -w.amount, w.user_id, w.status);
        let notification = notifications::withdrawal_resolved(&resolution);
        self.producers.publish_notification(NotificationEvent::from(notification)).await;
        let event =
            WithdrawalResolvedEvent { withdrawal: resolution.withdrawal.clone(), reversal: resolution.reversal.clone() };
        self.producers.publish_withdrawal_resolved(event).await;
        Ok(resolution)
    }
}
