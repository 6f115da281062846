use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    events::EventProducers,
    order_objects::StatusChange,
    payment_objects::WebhookNotification,
    settle_api::order_flow_api::OrderFlowApi,
    traits::{
        CatalogManagement,
        OrderFlowError,
        OrderManagement,
        PaymentGateway,
        WebhookQueue,
        WebhookQueueError,
    },
};

const RETRY_BATCH_SIZE: i64 = 50;

/// Exponential backoff for failed webhook notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 8, base_delay: Duration::minutes(1), max_delay: Duration::hours(1) }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based): `base × 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: i64) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1).clamp(0, 20)).unwrap_or(20);
        let factor = 1i32 << exponent;
        let delay = self.base_delay.checked_mul(factor).unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }

    pub fn next_attempt_at(&self, now: DateTime<Utc>, attempt: i64) -> DateTime<Utc> {
        now + self.delay_for(attempt)
    }
}

/// What became of a single webhook notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment notification, or no payment id.
    Ignored,
    /// No order is linked to the payment.
    Unmatched(String),
    Applied(StatusChange),
    /// Processing failed and the notification was queued for retry.
    Queued(String),
    /// Processing failed and could not even be queued. Only logs remain.
    Dropped(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySweep {
    pub succeeded: usize,
    pub rescheduled: usize,
    pub abandoned: usize,
}

/// `WebhookReconcilerApi` resolves gateway notifications to orders and applies them idempotently.
///
/// Notification bodies are never trusted for the payment status: the gateway is re-queried for the authoritative
/// state. Processing never fails from the gateway's point of view. Failures are parked in the [`WebhookQueue`] and
/// retried by [`WebhookReconcilerApi::process_due_retries`].
pub struct WebhookReconcilerApi<B, G> {
    flow: OrderFlowApi<B>,
    gateway: G,
    retry_policy: RetryPolicy,
}

impl<B, G> Debug for WebhookReconcilerApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookReconcilerApi ({:?})", self.retry_policy)
    }
}

impl<B, G> WebhookReconcilerApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { flow: OrderFlowApi::new(db, producers), gateway, retry_policy: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        self.flow.db()
    }
}

impl<B, G> WebhookReconcilerApi<B, G>
where
    B: OrderManagement + CatalogManagement + WebhookQueue,
    G: PaymentGateway,
{
    pub async fn handle_notification(&self, notification: WebhookNotification) -> WebhookOutcome {
        if !notification.is_payment() {
            debug!("🪝️ Ignoring {:?} notification", notification.kind);
            return WebhookOutcome::Ignored;
        }
        let Some(payment_id) = notification.payment_id().map(String::from) else {
            warn!("🪝️ Payment notification without a payment id: {notification:?}");
            return WebhookOutcome::Ignored;
        };
        let notification_id = notification.notification_id().unwrap_or_else(|| payment_id.clone());
        match self.reconcile_payment(&payment_id).await {
            Ok(Some(change)) => WebhookOutcome::Applied(change),
            Ok(None) => WebhookOutcome::Unmatched(payment_id),
            Err(e) => {
                error!("🪝️ Notification {notification_id} for payment {payment_id} failed. {e}");
                let next = self.retry_policy.next_attempt_at(Utc::now(), 1);
                match self.flow.db().enqueue_retry(&notification_id, &payment_id, &e.to_string(), next).await {
                    Ok(retry) => {
                        info!("🪝️ Notification {notification_id} queued for retry #{} at {next}", retry.id);
                        WebhookOutcome::Queued(notification_id)
                    },
                    Err(qe) => {
                        error!("🪝️ Could not queue notification {notification_id} for retry. It is lost. {qe}");
                        WebhookOutcome::Dropped(notification_id)
                    },
                }
            },
        }
    }

    /// Fetches the authoritative status of a payment and applies it to the linked order.
    ///
    /// Returns `None` if no order is linked to the payment.
    pub async fn reconcile_payment(&self, payment_id: &str) -> Result<Option<StatusChange>, OrderFlowError> {
        let payment = self.gateway.fetch_payment(payment_id).await?;
        let status = payment.status.normalize();
        trace!("🪝️ Payment {payment_id} is {} ({status})", payment.status);
        let db = self.flow.db();
        let order = match db.fetch_order_by_payment_id(payment_id).await? {
            Some(order) => order,
            None => {
                // The attempt may not have been recorded if the process died right after calling the gateway.
                let reference = payment.external_reference.as_deref().and_then(|r| r.parse::<i64>().ok());
                let Some(order) = (match reference {
                    Some(id) => db.fetch_order(id).await?,
                    None => None,
                }) else {
                    warn!("🪝️ Payment {payment_id} is not linked to any order");
                    return Ok(None);
                };
                info!("🪝️ Linking unrecorded payment {payment_id} to order {} by reference", order.order_number);
                db.record_payment_attempt(order.id, payment_id, order.payment_method).await?
            },
        };
        let change = self.flow.apply_payment_status(order, status).await?;
        Ok(Some(change))
    }

    /// Retries every queued notification that is due.
    pub async fn process_due_retries(&self) -> Result<RetrySweep, WebhookQueueError> {
        let now = Utc::now();
        let due = self.flow.db().fetch_due_retries(now, RETRY_BATCH_SIZE).await?;
        let mut sweep = RetrySweep::default();
        for retry in due {
            match self.reconcile_payment(&retry.payment_id).await {
                Ok(_) => {
                    self.flow.db().mark_retry_done(retry.id).await?;
                    debug!("🪝️ Retry of notification {} succeeded", retry.notification_id);
                    sweep.succeeded += 1;
                },
                Err(e) => {
                    let attempt = retry.attempts + 1;
                    let next = self.retry_policy.next_attempt_at(now, attempt + 1);
                    let status = self
                        .flow
                        .db()
                        .record_retry_failure(retry.id, &e.to_string(), next, self.retry_policy.max_attempts)
                        .await?;
                    if status == crate::db_types::RetryStatus::Abandoned {
                        error!(
                            "🪝️ Giving up on notification {} for payment {} after {attempt} attempts. {e}",
                            retry.notification_id, retry.payment_id
                        );
                        sweep.abandoned += 1;
                    } else {
                        warn!("🪝️ Retry {attempt} of notification {} failed. {e}", retry.notification_id);
                        sweep.rescheduled += 1;
                    }
                },
            }
        }
        Ok(sweep)
    }
}
