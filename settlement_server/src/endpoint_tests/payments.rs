use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::json;
use settle_common::Cents;
use settlement_engine::{
    db_types::{Role, UserBalance},
    events::EventProducers,
    LedgerApi,
    LedgerError,
    WithdrawalApi,
};

use super::helpers::{get_request, post_request, valid_token};
use crate::{
    endpoint_tests::mocks::MockLedgerManager,
    routes::{BalanceRoute, ListWithdrawalsRoute, RequestWithdrawalRoute},
};

const SELLER: i64 = 3;

#[actix_web::test]
async fn fetch_balance() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(SELLER, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/payments/balance", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"user_id":3,"balance":9000,"cashback_balance":250}"#);
}

#[actix_web::test]
async fn fetch_balance_for_unknown_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(404, vec![Role::User]);
    let (status, _) = get_request(&token, "/api/payments/balance", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn list_withdrawals_as_normal_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(SELLER, vec![Role::User, Role::ReadAll]);
    let (status, _) = get_request(&token, "/api/payments/withdrawals", configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn list_withdrawals_as_admin() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(1, vec![Role::Admin]);
    let (status, body) = get_request(&token, "/api/payments/withdrawals?status=pending", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn withdrawal_below_minimum() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(SELLER, vec![Role::User]);
    let (status, body) = post_request(&token, "/api/payments/withdraw", json!({"amount": 500}), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The minimum withdrawal is R$10.00. Requested R$5.00"}"#);
}

#[actix_web::test]
async fn withdrawal_without_funds() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(SELLER, vec![Role::User]);
    let (status, body) = post_request(&token, "/api/payments/withdraw", json!({"amount": 20_000}), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Insufficient balance"), "was: {body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedgerManager::new();
    ledger.expect_fetch_balance().returning(|user_id| {
        Ok((user_id == SELLER).then_some(UserBalance {
            user_id,
            balance: Cents::from(9_000),
            cashback_balance: Cents::from(250),
        }))
    });
    let ledger_api = LedgerApi::new(ledger);

    let mut withdrawals = MockLedgerManager::new();
    withdrawals.expect_search_transactions().returning(|_| Ok(vec![]));
    withdrawals.expect_request_withdrawal().returning(|_, amount| {
        Err(LedgerError::InsufficientBalance { requested: amount, available: Cents::from(9_000) })
    });
    let withdrawal_api = WithdrawalApi::new(withdrawals, EventProducers::default()).with_minimum(Cents::from(1_000));
    cfg.service(BalanceRoute::<MockLedgerManager>::new())
        .service(RequestWithdrawalRoute::<MockLedgerManager>::new())
        .service(ListWithdrawalsRoute::<MockLedgerManager>::new())
        .app_data(web::Data::new(ledger_api))
        .app_data(web::Data::new(withdrawal_api));
}
