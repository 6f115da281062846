use cucumber::{then, when};
use settlement_engine::{
    db_types::{OrderStatusType, PaymentMethod, ProductStatus},
    order_objects::Actor,
    payment_objects::{GatewayStatus, PaymentDetails, WebhookNotification},
    CatalogManagement,
    OrderManagement,
    PurchaseRequest,
};

use crate::cucumber::{world::money, MarketWorld};

#[when(expr = "{string} buys {string} with {word}")]
async fn buy(world: &mut MarketWorld, buyer: String, product: String, method: String) {
    let buyer = world.user(&buyer).clone();
    let request = PurchaseRequest {
        buyer_id: buyer.id,
        product_id: world.product(&product).id,
        address_id: world.addresses.get(&buyer.name).map(|a| a.id),
        payment_method: method.parse::<PaymentMethod>().expect("Unknown payment method"),
        shipping: None,
    };
    let result = world.market().factory.create_order(request).await;
    if let Some(order) = world.record(result) {
        world.orders.insert(product, order);
    }
}

#[when(expr = "{string} pays for {string} with pix")]
async fn pay(world: &mut MarketWorld, buyer: String, product: String) {
    let buyer_id = world.user(&buyer).id;
    let order_id = world.order(&product).id;
    let result = world.market().payments.checkout(buyer_id, order_id, PaymentDetails::Pix).await;
    if let Some(checkout) = world.record(result) {
        world.payments.insert(product.clone(), checkout.payment.payment_id);
        world.orders.insert(product, checkout.order);
    }
}

#[when(expr = "the gateway reports {word} for {string}")]
async fn gateway_reports(world: &mut MarketWorld, status: String, product: String) {
    let payment_id = world.payment_id(&product);
    let market = world.market();
    market.gateway.set_status(&payment_id, GatewayStatus::from(status.as_str()));
    let _ = market.reconciler.handle_notification(WebhookNotification::for_payment(payment_id)).await;
}

#[when(expr = "the gateway reports {word} for {string} twice")]
async fn gateway_reports_twice(world: &mut MarketWorld, status: String, product: String) {
    gateway_reports(world, status.clone(), product.clone()).await;
    gateway_reports(world, status, product).await;
}

#[when(expr = "{string} ships {string} with tracking code {string}")]
async fn ship(world: &mut MarketWorld, seller: String, product: String, code: String) {
    let actor = Actor::User(world.user(&seller).id);
    let order_id = world.order(&product).id;
    let result = world.market().shipments.mark_shipped(actor, order_id, &code, None).await;
    world.record(result);
}

#[when(expr = "the carrier delivers {string}")]
async fn carrier_delivers(world: &mut MarketWorld, product: String) {
    let order_id = world.order(&product).id;
    let result = world.market().shipments.mark_delivered(Actor::System, order_id).await;
    world.record(result);
}

#[when(expr = "{string} confirms receipt of {string}")]
async fn confirm_receipt(world: &mut MarketWorld, user: String, product: String) {
    let actor = Actor::User(world.user(&user).id);
    let order_id = world.order(&product).id;
    let result = world.market().shipments.mark_completed(actor, order_id).await;
    world.record(result);
}

#[when(expr = "an admin completes {string}")]
async fn admin_completes(world: &mut MarketWorld, product: String) {
    let order_id = world.order(&product).id;
    let result = world.market().shipments.mark_completed(Actor::Admin, order_id).await;
    world.record(result);
}

#[when(expr = "{string} requests a withdrawal of {word}")]
async fn request_withdrawal(world: &mut MarketWorld, user: String, amount: String) {
    let user_id = world.user(&user).id;
    let result = world.market().withdrawals.request_withdrawal(user_id, money(&amount)).await;
    if let Some(tx) = world.record(result) {
        world.withdrawals.push(tx.id);
    }
}

#[when(expr = "an admin {word} the withdrawal")]
async fn resolve_withdrawal(world: &mut MarketWorld, action: String) {
    let id = world.last_withdrawal();
    let withdrawals = &world.market().withdrawals;
    let result = match action.as_str() {
        "approves" => withdrawals.approve(id).await,
        "rejects" => withdrawals.reject(id).await,
        other => panic!("Unknown withdrawal action {other}"),
    };
    world.record(result);
}

#[then(expr = "the order for {string} is {word}")]
async fn order_status(world: &mut MarketWorld, product: String, status: String) {
    let order_id = world.order(&product).id;
    let order = world.market().db.fetch_order(order_id).await.expect("Error fetching order").expect("Order is gone");
    let expected = status.parse::<OrderStatusType>().expect("Unknown order status");
    assert_eq!(order.status, expected, "Order status is incorrect");
}

#[then(expr = "the order for {string} totals {word} with {word} commission and {word} for the seller")]
async fn order_amounts(world: &mut MarketWorld, product: String, total: String, commission: String, seller: String) {
    let order = world.order(&product);
    assert_eq!(order.total_amount, money(&total), "Total is incorrect");
    assert_eq!(order.commission_amount, money(&commission), "Commission is incorrect");
    assert_eq!(order.seller_receives, money(&seller), "Seller share is incorrect");
}

#[then(expr = "{string} is {word}")]
async fn product_status(world: &mut MarketWorld, product: String, status: String) {
    let id = world.product(&product).id;
    let product = world.market().db.fetch_product(id).await.expect("Error fetching product").expect("Product is gone");
    assert_eq!(product.status, status.parse::<ProductStatus>().expect("Unknown product status"));
}

#[then(expr = "{string} has a balance of {word} and cashback of {word}")]
async fn balances(world: &mut MarketWorld, user: String, balance: String, cashback: String) {
    let user_id = world.user(&user).id;
    let ledger = &world.market().ledger;
    let balances = ledger.balance(user_id).await.expect("Error fetching balance");
    assert_eq!(balances.balance, money(&balance), "Balance is incorrect");
    assert_eq!(balances.cashback_balance, money(&cashback), "Cashback balance is incorrect");
    let check = ledger.verify(user_id).await.expect("Error replaying ledger");
    assert!(check.consistent, "Ledger does not match the cached balances: {check:?}");
}

#[then(expr = "the request fails with {string}")]
async fn request_fails(world: &mut MarketWorld, message: String) {
    let error = world.last_error.as_deref().expect("The last request succeeded");
    assert!(error.contains(&message), "Expected an error containing '{message}', got '{error}'");
}

#[then("the request succeeds")]
async fn request_succeeds(world: &mut MarketWorld) {
    assert!(world.last_error.is_none(), "The last request failed: {:?}", world.last_error);
}
