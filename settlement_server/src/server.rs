use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::EventProducers,
    AccountApi,
    LedgerApi,
    OrderFactoryApi,
    PaymentApi,
    RetryPolicy,
    ShipmentApi,
    SqliteDatabase,
    WebhookReconcilerApi,
    WithdrawalApi,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{
        melhorenvio::MelhorEnvioAggregator,
        mercadopago::MercadoPagoGateway,
        notifications::create_event_handlers,
    },
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        BalanceRoute,
        CalculateShippingRoute,
        CancelLabelRoute,
        CheckoutBoletoRoute,
        CheckoutCardRoute,
        CheckoutPixRoute,
        CreateLabelRoute,
        CreateOrderRoute,
        LabelUrlRoute,
        ListWithdrawalsRoute,
        MarkShippedRoute,
        OrderByIdRoute,
        PaymentStatusRoute,
        PaymentWebhookRoute,
        PurchasesRoute,
        RequestWithdrawalRoute,
        ResolveWithdrawalRoute,
        SalesRoute,
        SalesStatsRoute,
        TrackShipmentRoute,
        TransactionsRoute,
        UpdateOrderStatusRoute,
        VerifyLedgerRoute,
    },
    workers::{start_completion_worker, start_expiry_worker, start_tracking_worker, start_webhook_retry_worker},
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MercadoPagoGateway::new(config.mercadopago.clone())?;
    let aggregator = MelhorEnvioAggregator::new(config.melhorenvio.clone())?;
    let handlers = create_event_handlers(db.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_background_workers(&config, &db, &gateway, &aggregator, &producers);
    let srv = create_server_instance(config, db, gateway, aggregator, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

fn start_background_workers(
    config: &ServerConfig,
    db: &SqliteDatabase,
    gateway: &MercadoPagoGateway,
    aggregator: &MelhorEnvioAggregator,
    producers: &EventProducers,
) {
    if config.expire_unpaid_orders {
        let _ = start_expiry_worker(db.clone(), producers.clone(), config.unpaid_order_timeout);
    } else {
        info!("🕰️ Unpaid order expiry is disabled");
    }
    let _ = start_completion_worker(db.clone(), producers.clone(), config.commission, config.completion_hold_period);
    let _ = start_webhook_retry_worker(db.clone(), gateway.clone(), producers.clone(), retry_policy(config));
    if config.melhorenvio.is_configured() {
        let _ = start_tracking_worker(
            db.clone(),
            producers.clone(),
            config.commission,
            aggregator.clone(),
            config.tracking_sync_interval,
        );
    } else {
        info!("🕰️ Tracking sync is disabled until a shipping aggregator token is configured");
    }
}

fn retry_policy(config: &ServerConfig) -> RetryPolicy {
    RetryPolicy { max_attempts: config.webhook_max_attempts, ..RetryPolicy::default() }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: MercadoPagoGateway,
    aggregator: MelhorEnvioAggregator,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let order_factory = OrderFactoryApi::new(db.clone(), producers.clone(), config.commission)
            .with_default_shipping(config.default_shipping_price);
        let accounts_api = AccountApi::new(db.clone());
        let payment_api = PaymentApi::new(db.clone(), gateway.clone(), producers.clone());
        let reconciler_api = WebhookReconcilerApi::new(db.clone(), gateway.clone(), producers.clone())
            .with_retry_policy(retry_policy(&config));
        let shipment_api = ShipmentApi::new(db.clone(), producers.clone(), config.commission);
        let ledger_api = LedgerApi::new(db.clone());
        let withdrawal_api = WithdrawalApi::new(db.clone(), producers.clone()).with_minimum(config.min_withdrawal);
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("settle::access_log"))
            .app_data(web::Data::new(order_factory))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(reconciler_api))
            .app_data(web::Data::new(shipment_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(withdrawal_api))
            .app_data(web::Data::new(aggregator.clone()))
            .app_data(web::Data::new(ServerOptions::from_config(&config)))
            .app_data(web::JsonConfig::default().error_handler(|e, _| ServerError::InvalidRequestBody(e.to_string()).into()))
            .app_data(web::PathConfig::default().error_handler(|e, _| ServerError::InvalidRequestPath(e.to_string()).into()));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(PurchasesRoute::<SqliteDatabase>::new())
            .service(SalesRoute::<SqliteDatabase>::new())
            .service(SalesStatsRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(CheckoutPixRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CheckoutCardRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CheckoutBoletoRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CalculateShippingRoute::<SqliteDatabase, MelhorEnvioAggregator>::new())
            .service(MarkShippedRoute::<SqliteDatabase>::new())
            .service(TrackShipmentRoute::<SqliteDatabase, MelhorEnvioAggregator>::new())
            .service(CreateLabelRoute::<SqliteDatabase, MelhorEnvioAggregator>::new())
            .service(LabelUrlRoute::<SqliteDatabase, MelhorEnvioAggregator>::new())
            .service(CancelLabelRoute::<SqliteDatabase, MelhorEnvioAggregator>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(TransactionsRoute::<SqliteDatabase>::new())
            .service(RequestWithdrawalRoute::<SqliteDatabase>::new())
            .service(ListWithdrawalsRoute::<SqliteDatabase>::new())
            .service(ResolveWithdrawalRoute::<SqliteDatabase>::new())
            .service(VerifyLedgerRoute::<SqliteDatabase>::new());
        // The gateway cannot authenticate itself, so its callback lives outside the JWT scope
        app.service(health).service(PaymentWebhookRoute::<SqliteDatabase, MercadoPagoGateway>::new()).service(auth_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
