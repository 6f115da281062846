use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use serde_json::{json, Value};
use settle_common::Cents;
use settlement_engine::{
    db_types::{Order, OrderStatusType, PaymentMethod, SubscriptionTier},
    events::EventProducers,
    payment_objects::{GatewayStatus, PaymentDetails},
    test_utils::{
        fakes::FakeGateway,
        prepare_env::{drop_database, fresh_database},
        seed::{seed_address, seed_product, seed_user},
    },
    traits::OrderManagement,
    CommissionPolicy,
    OrderFactoryApi,
    PaymentApi,
    PurchaseRequest,
    SqliteDatabase,
    WebhookReconcilerApi,
};

use crate::{config::ServerOptions, routes::PaymentWebhookRoute};

#[actix_web::test]
async fn approval_in_the_body() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let gateway = FakeGateway::new();
    let (order, payment_id) = pix_order(&db, &gateway).await;
    gateway.set_status(&payment_id, GatewayStatus::Approved);
    let body = json!({"id": 12345, "type": "payment", "action": "payment.updated", "data": {"id": payment_id}});
    let (status, response) = post_webhook(&db, &gateway, "/checkout/webhook", body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], format!("Order {} is pending_shipment.", order.order_number));
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingShipment);
    drop_database(db).await;
}

#[actix_web::test]
async fn approval_in_the_query_string() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let gateway = FakeGateway::new();
    let (order, payment_id) = pix_order(&db, &gateway).await;
    gateway.set_status(&payment_id, GatewayStatus::Approved);
    let uri = format!("/checkout/webhook?type=payment&data.id={payment_id}");
    let (status, response) = post_webhook(&db, &gateway, &uri, String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingShipment);
    drop_database(db).await;
}

#[actix_web::test]
async fn an_unreadable_query_string_does_not_hide_the_body() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let gateway = FakeGateway::new();
    let (order, payment_id) = pix_order(&db, &gateway).await;
    gateway.set_status(&payment_id, GatewayStatus::Approved);
    let body = json!({"type": "payment", "data": {"id": payment_id}});
    let uri = format!("/checkout/webhook?id={payment_id}&id={payment_id}&topic=payment");
    let (status, response) = post_webhook(&db, &gateway, &uri, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingShipment);
    // Nothing readable anywhere is still acknowledged
    let (status, response) = post_webhook(&db, &gateway, "/checkout/webhook?id=1&id=2", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], false);
    drop_database(db).await;
}

#[actix_web::test]
async fn the_notification_status_is_never_trusted() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let gateway = FakeGateway::new();
    let (order, payment_id) = pix_order(&db, &gateway).await;
    // The gateway still says pending, whatever the payload claims
    let body = json!({"type": "payment", "status": "approved", "data": {"id": payment_id}});
    let (status, _) = post_webhook(&db, &gateway, "/checkout/webhook", body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    drop_database(db).await;
}

#[actix_web::test]
async fn nonsense_still_gets_a_200() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(1).await;
    let gateway = FakeGateway::new();
    let (status, response) = post_webhook(&db, &gateway, "/checkout/webhook", "not json at all".into()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], false);
    let body = json!({"type": "merchant_order", "data": {"id": "999"}});
    let (status, response) = post_webhook(&db, &gateway, "/checkout/webhook", body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Ignored.");
    // The gateway does not know this payment. The notification is kept for a retry
    let body = json!({"type": "payment", "data": {"id": "999"}});
    let (status, response) = post_webhook(&db, &gateway, "/checkout/webhook", body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Notification 999:payment queued for retry.");
    drop_database(db).await;
}

/// A PIX order waiting for payment, and its gateway payment id.
async fn pix_order(db: &SqliteDatabase, gateway: &FakeGateway) -> (Order, String) {
    let seller = seed_user(db, "Maria Vendedora", SubscriptionTier::Free).await;
    let buyer = seed_user(db, "João Comprador", SubscriptionTier::Free).await;
    let address = seed_address(db, buyer.id).await;
    let product = seed_product(db, seller.id, Cents::from_reais(100)).await;
    let factory = OrderFactoryApi::new(db.clone(), EventProducers::default(), CommissionPolicy::default());
    let request = PurchaseRequest {
        buyer_id: buyer.id,
        product_id: product.id,
        address_id: Some(address.id),
        payment_method: PaymentMethod::Pix,
        shipping: None,
    };
    let order = factory.create_order(request).await.expect("Error creating order");
    let payments = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = payments.checkout(buyer.id, order.id, PaymentDetails::Pix).await.expect("Error during checkout");
    (result.order, result.payment.payment_id)
}

async fn post_webhook(db: &SqliteDatabase, gateway: &FakeGateway, uri: &str, body: String) -> (StatusCode, Value) {
    let api = WebhookReconcilerApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let options = ServerOptions { use_x_forwarded_for: false, use_forwarded: false };
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(options))
        .service(PaymentWebhookRoute::<SqliteDatabase, FakeGateway>::new());
    let service = test::init_service(app).await;
    let req = TestRequest::post()
        .uri(uri)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let bytes = res.into_body().try_into_bytes().unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
