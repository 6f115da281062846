//! Races that the conditional updates in the backend must win.
use futures_util::future::join_all;
use settle_common::Cents;
use settlement_engine::{
    db_types::{OrderStatusType, PaymentMethod, TransactionType},
    order_objects::StatusChange,
    payment_objects::{GatewayStatus, WebhookNotification},
    test_utils::seed::{seed_address, seed_user},
    LedgerError,
    OrderManagement,
    PurchaseRequest,
    WebhookOutcome,
};

mod support;

use support::{count_kind, Market};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_approvals_apply_once() {
    let market = Market::new().await;
    let parties = market.parties(Cents::from_reais(100)).await;
    let order = market.buy(&parties, PaymentMethod::Pix).await;
    let payment_id = market.pay_with_pix(&order).await;
    market.gateway.set_status(&payment_id, GatewayStatus::Approved);

    let deliveries = (0..8).map(|i| {
        let notification = WebhookNotification::for_payment(payment_id.clone()).with_id(format!("dup-{i}"));
        market.reconciler.handle_notification(notification)
    });
    let outcomes = join_all(deliveries).await;
    let moved = outcomes.iter().filter(|o| matches!(o, WebhookOutcome::Applied(StatusChange::Moved { .. }))).count();
    assert_eq!(moved, 1);
    let order = market.db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingShipment);

    let notifications = market.finish().await;
    assert_eq!(count_kind(&notifications, "sale"), 1);
    assert_eq!(count_kind(&notifications, "order"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_cannot_overdraw() {
    let market = Market::new().await;
    let seller = seed_user(&market.db, "Ana Vendedora", Default::default()).await;
    market.ledger.credit(seller.id, Cents::from_reais(100), TransactionType::Sale, None, "Vendas").await.unwrap();

    let requests = (0..10).map(|_| market.withdrawals.request_withdrawal(seller.id, Cents::from_reais(30)));
    let results = join_all(requests).await;
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 3);

    let balance = market.ledger.balance(seller.id).await.unwrap();
    assert_eq!(balance.balance, Cents::from_reais(10));
    assert!(market.ledger.verify(seller.id).await.unwrap().consistent);
    market.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_resolve_once() {
    let market = Market::new().await;
    let seller = seed_user(&market.db, "Bia Vendedora", Default::default()).await;
    market.ledger.credit(seller.id, Cents::from_reais(100), TransactionType::Sale, None, "Vendas").await.unwrap();
    let withdrawal = market.withdrawals.request_withdrawal(seller.id, Cents::from_reais(60)).await.unwrap();

    let rejections = (0..8).map(|_| market.withdrawals.reject(withdrawal.id));
    let results = join_all(rejections).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::WithdrawalAlreadyResolved(id) if *id == withdrawal.id)));

    // A single reversal, so the money comes back exactly once
    let balance = market.ledger.balance(seller.id).await.unwrap();
    assert_eq!(balance.balance, Cents::from_reais(100));
    assert!(market.ledger.verify(seller.id).await.unwrap().consistent);
    market.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_product_one_order() {
    let market = Market::new().await;
    let parties = market.parties(Cents::from_reais(80)).await;
    let mut buyers = Vec::new();
    for i in 0..6 {
        let buyer = seed_user(&market.db, &format!("Comprador {i}"), Default::default()).await;
        let address = seed_address(&market.db, buyer.id).await;
        buyers.push((buyer.id, address.id));
    }

    let purchases = buyers.iter().map(|(buyer_id, address_id)| {
        market.factory.create_order(PurchaseRequest {
            buyer_id: *buyer_id,
            product_id: parties.product.id,
            address_id: Some(*address_id),
            payment_method: PaymentMethod::Pix,
            shipping: None,
        })
    });
    let results = join_all(purchases).await;
    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);
    market.finish().await;
}
