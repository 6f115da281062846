use futures::future::BoxFuture;
use log::*;
use settlement_engine::{
    db_types::TransactionStatus,
    events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderSettledEvent, WithdrawalResolvedEvent},
    traits::NotificationManagement,
    SqliteDatabase,
};

pub const EVENT_BUFFER_SIZE: usize = 50;

/// Wires the engine's events to their side effects.
///
/// * Notifications are stored, so that the buyer and seller see them in the app.
/// * Approved withdrawals are logged for payout. The payout itself happens outside the marketplace.
/// * Everything else is logged.
///
/// Handlers run on their own tasks. A slow or failing handler never holds up the request that published the event.
pub fn create_event_handlers(db: SqliteDatabase) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On Notification Handler ---
    hooks.on_notification(move |ev| {
        let db = db.clone();
        Box::pin(async move {
            let user_id = ev.notification.user_id;
            let kind = ev.notification.kind.clone();
            match db.insert_notification(ev.notification).await {
                Ok(n) => debug!("🔔️ Notification #{} ({kind}) stored for user #{user_id}", n.id),
                Err(e) => error!("🔔️ Could not store a {kind} notification for user #{user_id}. {e}"),
            }
        })
    });
    hooks.on_order_created(|ev| {
        info!("🔔️ Order {} created. {} for product #{}", ev.order.order_number, ev.order.total_amount, ev.order.product_id);
        no_op()
    });
    hooks.on_order_paid(|ev| {
        info!("🔔️ Order {} has been paid. The seller can ship it now", ev.order.order_number);
        no_op()
    });
    hooks.on_order_annulled(|ev| {
        let OrderAnnulledEvent { order, status } = ev;
        info!("🔔️ Order {} was annulled ({status}). Product #{} is available again", order.order_number, order.product_id);
        no_op()
    });
    hooks.on_order_shipped(|ev| {
        let code = ev.order.tracking_code.as_deref().unwrap_or("no tracking code");
        info!("🔔️ Order {} shipped ({code})", ev.order.order_number);
        no_op()
    });
    hooks.on_order_settled(|ev| {
        let OrderSettledEvent { order, sale, cashback } = ev;
        let cashback = cashback.map(|c| c.amount.to_string()).unwrap_or_else(|| "no".to_string());
        info!(
            "🔔️ Order {} settled. Seller #{} credited {}. Buyer #{} gets {cashback} cashback",
            order.order_number, order.seller_id, sale.amount, order.buyer_id
        );
        no_op()
    });
    hooks.on_withdrawal_resolved(|ev| {
        let WithdrawalResolvedEvent { withdrawal, reversal } = ev;
        let amount = -withdrawal.amount;
        match withdrawal.status {
            TransactionStatus::Approved => info!(
                "💰️ Withdrawal #{} approved. Pay out {amount} to user #{} now",
                withdrawal.id, withdrawal.user_id
            ),
            status => info!(
                "💰️ Withdrawal #{} of {amount} for user #{} is {status}. Reversal entry: {:?}",
                withdrawal.id,
                withdrawal.user_id,
                reversal.map(|r| r.id)
            ),
        }
        no_op()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
