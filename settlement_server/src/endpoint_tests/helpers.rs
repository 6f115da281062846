use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Duration;
use log::debug;
use settlement_engine::db_types::Role;

use crate::{
    auth::{TokenIssuer, TokenValidator},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
};

// Test-only secret. DO NOT re-use it anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-secret-0123456789abcdef", "marketplace-auth")
}

pub fn issue_token(user_id: i64, roles: Vec<Role>, lifetime: Duration) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(user_id, roles, Some(lifetime)).expect("Failed to sign token")
}

pub fn valid_token(user_id: i64, roles: Vec<Role>) -> String {
    issue_token(user_id, roles, Duration::hours(1))
}

pub async fn get_request(token: &str, path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    call(TestRequest::get(), token, path, configure).await
}

pub async fn post_request(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    call(TestRequest::post().set_json(body), token, path, configure).await
}

/// Mounts the routes under `/api` behind the JWT middleware, as the server does, and makes a single request.
/// Errors raised by middleware are turned into the response the client would see.
async fn call(
    req: TestRequest,
    token: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = req.uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new().service(web::scope("/api").wrap(JwtMiddlewareFactory::new(validator)).configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request to {path}");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}
