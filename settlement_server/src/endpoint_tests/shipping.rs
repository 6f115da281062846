use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use serde_json::{json, Value};
use settle_common::Cents;
use settlement_engine::{
    db_types::{Order, OrderStatusType, PaymentMethod, Role, SubscriptionTier, UserProfile},
    events::EventProducers,
    order_objects::Actor,
    payment_objects::{GatewayStatus, PaymentDetails, WebhookNotification},
    test_utils::{
        fakes::{FakeCarrier, FakeGateway},
        prepare_env::{drop_database, fresh_database},
        seed::{seed_address, seed_product, seed_user},
    },
    traits::OrderManagement,
    CommissionPolicy,
    OrderFactoryApi,
    PaymentApi,
    PurchaseRequest,
    ShipmentApi,
    SqliteDatabase,
    WebhookReconcilerApi,
};

use super::helpers::{get_auth_config, valid_token};
use crate::{
    auth::TokenValidator,
    middleware::JwtMiddlewareFactory,
    routes::{CancelLabelRoute, CreateLabelRoute, LabelUrlRoute},
};

#[actix_web::test]
async fn seller_buys_prints_and_cancels_a_label() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let carrier = FakeCarrier::new();
    let (seller, buyer, order) = paid_order(&db).await;
    let seller_token = valid_token(seller.id, vec![Role::User]);
    let create = json!({"order_id": order.id, "service_id": 2});

    let (status, _) = call(&db, &carrier, "", TestRequest::post(), "/api/shipping/create", Some(create.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let buyer_token = valid_token(buyer.id, vec![Role::User]);
    let req = TestRequest::post();
    let (status, _) = call(&db, &carrier, &buyer_token, req, "/api/shipping/create", Some(create.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post();
    let (status, label) = call(&db, &carrier, &seller_token, req, "/api/shipping/create", Some(create.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(label["order_id"], order.id);
    assert_eq!(label["label_id"], "label-1");
    assert_eq!(label["service_id"], 2);
    assert_eq!(label["status"], "purchased");
    let req = TestRequest::post();
    let (status, _) = call(&db, &carrier, &seller_token, req, "/api/shipping/create", Some(create)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let path = format!("/api/shipping/label/{}", order.id);
    let (status, body) = call(&db, &carrier, &seller_token, TestRequest::get(), &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label_url"], "https://labels.test/label-1.pdf");

    // Admins may cancel labels on orders they are not a party to
    let admin_token = valid_token(9_999, vec![Role::User, Role::Admin]);
    let cancel = json!({"order_id": order.id});
    let req = TestRequest::post();
    let (status, label) = call(&db, &carrier, &admin_token, req, "/api/shipping/cancel", Some(cancel.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(label["status"], "cancelled");
    assert!(!carrier.label("label-1").unwrap().1);
    let (status, _) = call(&db, &carrier, &seller_token, TestRequest::get(), &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let req = TestRequest::post();
    let (status, _) = call(&db, &carrier, &seller_token, req, "/api/shipping/cancel", Some(cancel)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    drop_database(db).await;
}

#[actix_web::test]
async fn no_labels_once_the_parcel_has_shipped() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database(5).await;
    let carrier = FakeCarrier::new();
    let (seller, _, order) = paid_order(&db).await;
    let token = valid_token(seller.id, vec![Role::User]);
    let shipments = ShipmentApi::new(db.clone(), EventProducers::default(), CommissionPolicy::default());
    shipments.mark_shipped(Actor::User(seller.id), order.id, "BR123456789BR", None).await.unwrap();
    let create = json!({"order_id": order.id, "service_id": 1});
    let (status, body) = call(&db, &carrier, &token, TestRequest::post(), "/api/shipping/create", Some(create)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(carrier.label("label-1").is_none());
    drop_database(db).await;
}

/// A paid PIX order. Both parties have an address on file.
async fn paid_order(db: &SqliteDatabase) -> (UserProfile, UserProfile, Order) {
    let seller = seed_user(db, "Maria Vendedora", SubscriptionTier::Free).await;
    let buyer = seed_user(db, "João Comprador", SubscriptionTier::Free).await;
    seed_address(db, seller.id).await;
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
    let gateway = FakeGateway::new();
    let payments = PaymentApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let result = payments.checkout(buyer.id, order.id, PaymentDetails::Pix).await.expect("Error during checkout");
    gateway.set_status(&result.payment.payment_id, GatewayStatus::Approved);
    let reconciler = WebhookReconcilerApi::new(db.clone(), gateway, EventProducers::default());
    let _ = reconciler.handle_notification(WebhookNotification::for_payment(result.payment.payment_id)).await;
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingShipment);
    (seller, buyer, order)
}

async fn call(
    db: &SqliteDatabase,
    carrier: &FakeCarrier,
    token: &str,
    req: TestRequest,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let api = ShipmentApi::new(db.clone(), EventProducers::default(), CommissionPolicy::default());
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new().app_data(web::Data::new(api)).app_data(web::Data::new(carrier.clone())).service(
        web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(CreateLabelRoute::<SqliteDatabase, FakeCarrier>::new())
            .service(LabelUrlRoute::<SqliteDatabase, FakeCarrier>::new())
            .service(CancelLabelRoute::<SqliteDatabase, FakeCarrier>::new()),
    );
    let service = test::init_service(app).await;
    let mut req = req.uri(path);
    if let Some(body) = body {
        req = req.set_json(body);
    }
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let bytes = res.into_body().try_into_bytes().unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        },
        Err(e) => (e.as_response_error().status_code(), Value::Null),
    }
}
