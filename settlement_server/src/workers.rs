//! Background jobs. Each worker runs on its own task for the lifetime of the server.
//!
//! Workers only ever call the engine's idempotent sweeps, so running one twice, or alongside a request touching the
//! same order, is harmless: the conditional status updates make the second attempt a no-op.
use chrono::Duration;
use log::*;
use settlement_engine::{
    db_types::Order,
    events::EventProducers,
    CommissionPolicy,
    OrderFlowApi,
    RetryPolicy,
    ShipmentApi,
    SqliteDatabase,
    WebhookReconcilerApi,
};
use tokio::task::JoinHandle;

use crate::integrations::{melhorenvio::MelhorEnvioAggregator, mercadopago::MercadoPagoGateway};

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);
const COMPLETION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(900);
const WEBHOOK_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Cancels orders that were never paid, releasing their products. Do not await the returned JoinHandle, as it will
/// run indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, unpaid_expiry: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.expire_unpaid_orders(unpaid_expiry).await {
                Ok(result) if result.count() > 0 => {
                    info!("🕰️ {} unpaid orders expired: {}", result.count(), order_list(&result.changed));
                },
                Ok(result) => trace!("🕰️ No orders expired. {} skipped", result.skipped),
                Err(e) => error!("🕰️ Error running unpaid order expiry job: {e}"),
            }
        }
    })
}

/// Completes delivered orders once the hold period is over, releasing the funds to the sellers.
pub fn start_completion_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    policy: CommissionPolicy,
    hold_period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(COMPLETION_INTERVAL);
        let api = ShipmentApi::new(db, producers, policy);
        info!("🕰️ Automatic completion worker started. Delivered orders are completed after {hold_period}");
        loop {
            timer.tick().await;
            debug!("🕰️ Running automatic completion job");
            match api.complete_delivered_orders(hold_period).await {
                Ok(result) if result.count() > 0 => {
                    info!("🕰️ {} delivered orders completed: {}", result.count(), order_list(&result.changed));
                },
                Ok(result) => trace!("🕰️ No orders completed. {} skipped", result.skipped),
                Err(e) => error!("🕰️ Error running automatic completion job: {e}"),
            }
        }
    })
}

/// Replays payment notifications that failed the first time round.
pub fn start_webhook_retry_worker(
    db: SqliteDatabase,
    gateway: MercadoPagoGateway,
    producers: EventProducers,
    retry_policy: RetryPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(WEBHOOK_RETRY_INTERVAL);
        let api = WebhookReconcilerApi::new(db, gateway, producers).with_retry_policy(retry_policy);
        info!("🕰️ Webhook retry worker started");
        loop {
            timer.tick().await;
            match api.process_due_retries().await {
                Ok(sweep) if sweep.succeeded + sweep.rescheduled + sweep.abandoned > 0 => info!(
                    "🕰️ Webhook retries: {} succeeded, {} rescheduled, {} abandoned",
                    sweep.succeeded, sweep.rescheduled, sweep.abandoned
                ),
                Ok(_) => trace!("🕰️ No webhook retries due"),
                Err(e) => error!("🕰️ Error processing webhook retries: {e}"),
            }
        }
    })
}

/// Polls the shipping aggregator for orders in transit and marks them delivered when the carrier says so.
pub fn start_tracking_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    policy: CommissionPolicy,
    aggregator: MelhorEnvioAggregator,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(1800));
        let mut timer = tokio::time::interval(period);
        let api = ShipmentApi::new(db, producers, policy);
        info!("🕰️ Tracking sync worker started. Polling every {interval}");
        loop {
            timer.tick().await;
            debug!("🕰️ Running tracking sync job");
            match api.sync_tracking(&aggregator).await {
                Ok(result) if result.count() > 0 => {
                    info!("🕰️ {} orders moved by tracking updates: {}", result.count(), order_list(&result.changed));
                },
                Ok(result) => trace!("🕰️ No tracking changes. {} skipped", result.skipped),
                Err(e) => error!("🕰️ Error running tracking sync job: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} ({})", o.id, o.order_number, o.status))
        .collect::<Vec<String>>()
        .join(", ")
}
