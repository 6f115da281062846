use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, TimeZone, Utc};
use log::debug;
use settle_common::{BasisPoints, Cents};
use settlement_engine::{
    db_types::{Order, OrderNumber, OrderStatusType, PaymentMethod, Role},
    AccountApi,
};

use super::helpers::{get_request, issue_token, valid_token};
use crate::{
    endpoint_tests::mocks::MockOrderManager,
    routes::{OrderByIdRoute, PurchasesRoute, SalesRoute},
};

const BUYER: i64 = 2;
const SELLER: i64 = 3;

#[actix_web::test]
async fn fetch_purchases_no_headers() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/api/orders/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. No bearer token was provided.");
}

#[actix_web::test]
async fn fetch_purchases_expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER, vec![Role::User], Duration::hours(-2));
    let (status, body) = get_request(&token, "/api/orders/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. The access token has expired.");
}

#[actix_web::test]
async fn fetch_purchases_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token(BUYER, vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    debug!("Calling /orders/purchases with invalid token {token}");
    let (status, body) = get_request(&token, "/api/orders/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.starts_with("Authentication Error. Access token is invalid."), "was: {body}");
}

#[actix_web::test]
async fn fetch_my_purchases() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(BUYER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/purchases", configure).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders, vec![sample_order()]);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json[0]["total_amount"], 11_500);
    assert_eq!(json[0]["status"], "pending_shipment");
}

#[actix_web::test]
async fn filter_purchases_and_sales_by_status() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(BUYER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/purchases?status=pending_shipment", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Order>>(&body).unwrap(), vec![sample_order()]);
    let (status, body) = get_request(&token, "/api/orders/purchases?status=shipped", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    let (status, body) = get_request(&token, "/api/orders/purchases?status=lost_at_sea", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid query parameter. 'lost_at_sea' is not an order status"}"#);

    let token = valid_token(SELLER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/sales?status=all", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Order>>(&body).unwrap(), vec![sample_order()]);
    let (status, body) = get_request(&token, "/api/orders/sales?status=delivered", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn fetch_order_as_seller() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(SELLER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/42", configure).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.order_number, OrderNumber::from("AP2024060001"));
}

#[actix_web::test]
async fn try_fetch_another_users_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(99, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/42", configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. User 99 is not allowed to act on order 42"}"#);
}

#[actix_web::test]
async fn fetch_another_users_order_as_support() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(99, vec![Role::User, Role::ReadAll]);
    let (status, _) = get_request(&token, "/api/orders/42", configure).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(BUYER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders/7", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Order 7 does not exist"), "was: {body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager.expect_search_orders().returning(|q| {
        let order = sample_order();
        let party =
            q.buyer_id.map_or(true, |id| id == order.buyer_id) && q.seller_id.map_or(true, |id| id == order.seller_id);
        let status = q.statuses.is_empty() || q.statuses.contains(&order.status);
        Ok(if party && status { vec![order] } else { vec![] })
    });
    order_manager.expect_fetch_order().returning(|id| Ok((id == 42).then(sample_order)));
    let accounts_api = AccountApi::new(order_manager);
    cfg.service(PurchasesRoute::<MockOrderManager>::new())
        .service(SalesRoute::<MockOrderManager>::new())
        .service(OrderByIdRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(accounts_api));
}

fn sample_order() -> Order {
    let created = Utc.with_ymd_and_hms(2024, 6, 1, 13, 30, 0).unwrap();
    Order {
        id: 42,
        order_number: OrderNumber::from("AP2024060001"),
        buyer_id: BUYER,
        seller_id: SELLER,
        product_id: 10,
        product_price: Cents::from(10_000),
        shipping_price: Cents::from(1_500),
        shipping_service: Some("PAC".into()),
        commission_rate: BasisPoints::from_bps(1_000),
        commission_amount: Cents::from(1_000),
        seller_receives: Cents::from(9_000),
        total_amount: Cents::from(11_500),
        status: OrderStatusType::PendingShipment,
        payment_method: PaymentMethod::Pix,
        payment_id: Some("1319728357".into()),
        paid_at: Some(created + Duration::minutes(5)),
        shipping_address_id: Some(1),
        shipping_carrier: None,
        tracking_code: None,
        shipped_at: None,
        delivered_at: None,
        completed_at: None,
        cancelled_at: None,
        cancel_reason: None,
        created_at: created,
        updated_at: created + Duration::minutes(5),
    }
}
