//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a few lines should push their logic down into
//! the engine APIs. Keep this module neat and tidy 🙏
//!
//! Every handler is generic over the backend traits it needs, so that the endpoint tests can swap the SQLite backend
//! for mocks. Actix cannot register generic handlers directly, so the `route!` macro generates a small service
//! factory for each one.
//!
//! Since each worker thread processes its requests sequentially, handlers must never block the thread. All I/O goes
//! through async calls.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use settle_common::Cents;
use settlement_engine::{
    db_types::{OrderStatusType, Role},
    ledger_objects::TransactionQueryFilter,
    order_objects::Actor,
    payment_objects::{PaymentDetails, WebhookNotification},
    traits::{
        CatalogManagement,
        LedgerManagement,
        MarketplaceDatabase,
        OrderFlowError,
        OrderManagement,
        PaymentGateway,
        ShippingAggregator,
    },
    AccountApi,
    LedgerApi,
    OrderFactoryApi,
    PaymentApi,
    ShipmentApi,
    WebhookOutcome,
    WebhookReconcilerApi,
    WithdrawalApi,
};

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{
        BoletoCheckoutRequest,
        CardCheckoutRequest,
        CreateLabelRequest,
        CreateOrderRequest,
        JsonResponse,
        LabelOrderRequest,
        LabelUrlResponse,
        MarkShippedRequest,
        OrderListParams,
        PixCheckoutRequest,
        SettlementResponse,
        ShippingCalculateRequest,
        TransactionQueryParams,
        UpdateStatusRequest,
        WebhookQueryParams,
        WithdrawalAction,
        WithdrawalListParams,
        WithdrawalRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketplaceDatabase);
/// Creates an order for a single product, reserving the product for the buyer.
///
/// The price breakdown is fixed at this point. Shipping uses the option the buyer picked from
/// `/shipping/calculate`, or the default price if none was given.
pub async fn create_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFactoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create_order for user #{}", claims.user_id());
    let request = body.into_inner().into_purchase_request(claims.user_id())?;
    let order = api.create_order(request).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(purchases => Get "/orders/purchases" impl OrderManagement);
pub async fn purchases<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderListParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET purchases for user #{}", claims.user_id());
    let orders = api.purchases(claims.user_id(), query.status()?).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(sales => Get "/orders/sales" impl OrderManagement);
pub async fn sales<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderListParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET sales for user #{}", claims.user_id());
    let orders = api.sales(claims.user_id(), query.status()?).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(sales_stats => Get "/orders/stats/sales" impl OrderManagement);
/// Revenue and order counts for the caller's sales in the current calendar month.
pub async fn sales_stats<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET sales_stats for user #{}", claims.user_id());
    let stats = api.monthly_sales_stats(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
/// Buyers and sellers can see their own orders. Users with the `ReadAll` or `Admin` role can see any order.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id}) for user #{}", claims.user_id());
    let order = api.order_for_user(claims.user_id(), order_id, claims.can_read_all()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl MarketplaceDatabase);
/// Moves an order along the shipping side of its lifecycle.
///
/// * `shipped` requires a tracking code and may only be set by the seller.
/// * `in_transit` and `delivered` may be set by the seller.
/// * `completed` may be set by the buyer, to confirm receipt. This releases the funds to the seller.
///
/// Admins can set any of these on orders they are not a party to.
pub async fn update_order_status<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
    api: web::Data<ShipmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ PATCH order {order_id} status to {} by user #{}", request.status, claims.user_id());
    request.validate()?;
    let order = api.db().fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
    let actor = if !order.is_participant(claims.user_id()) && claims.has_role(Role::Admin) {
        info!("💻️ Admin #{} is updating order {} on behalf of its participants", claims.user_id(), order.order_number);
        Actor::Admin
    } else {
        claims.actor()
    };
    let response = match request.status {
        OrderStatusType::Shipped => {
            let code = request.tracking_code.unwrap_or_default();
            HttpResponse::Ok().json(api.mark_shipped(actor, order_id, &code, request.carrier).await?)
        },
        OrderStatusType::InTransit => HttpResponse::Ok().json(api.mark_in_transit(actor, order_id).await?),
        OrderStatusType::Delivered => HttpResponse::Ok().json(api.mark_delivered(actor, order_id).await?),
        OrderStatusType::Completed => {
            let settlement = api.mark_completed(actor, order_id).await?;
            HttpResponse::Ok().json(SettlementResponse::from(settlement))
        },
        other => return Err(ServerError::Rejected(format!("The order status cannot be set to {other} by hand"))),
    };
    Ok(response)
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout_pix => Post "/checkout/pix" impl MarketplaceDatabase, PaymentGateway);
/// Starts a PIX payment for one of the caller's pending orders. The response carries the QR code.
pub async fn checkout_pix<B, G>(
    claims: JwtClaims,
    body: web::Json<PixCheckoutRequest>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST checkout_pix for order {order_id}");
    checkout(&api, &claims, order_id, PaymentDetails::Pix).await
}

route!(checkout_card => Post "/checkout/card" impl MarketplaceDatabase, PaymentGateway);
/// Card payments use a token produced by the gateway's client-side SDK. Raw card data never reaches this server.
pub async fn checkout_card<B, G>(
    claims: JwtClaims,
    body: web::Json<CardCheckoutRequest>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let (order_id, details) = body.into_inner().into_details()?;
    debug!("💻️ POST checkout_card for order {order_id}");
    checkout(&api, &claims, order_id, details).await
}

route!(checkout_boleto => Post "/checkout/boleto" impl MarketplaceDatabase, PaymentGateway);
/// Boleto payments need the order to have a shipping address, which is used as the payer's billing address.
pub async fn checkout_boleto<B, G>(
    claims: JwtClaims,
    body: web::Json<BoletoCheckoutRequest>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST checkout_boleto for order {order_id}");
    checkout(&api, &claims, order_id, PaymentDetails::Boleto).await
}

async fn checkout<B, G>(
    api: &PaymentApi<B, G>,
    claims: &JwtClaims,
    order_id: i64,
    details: PaymentDetails,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let result = api.checkout(claims.user_id(), order_id, details).await.map_err(|e| {
        debug!("💻️ Checkout for order {order_id} failed. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(result))
}

route!(payment_status => Get "/checkout/payment/{payment_id}" impl MarketplaceDatabase, PaymentGateway);
/// Live status of a payment, straight from the gateway.
pub async fn payment_status<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let payment_id = path.into_inner();
    debug!("💻️ GET payment_status({payment_id}) for user #{}", claims.user_id());
    let payment = api.payment_status(claims.user_id(), &payment_id, claims.can_read_all()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

//------------------------------------------   Payment notifications  ---------------------------------------------
route!(payment_webhook => Post "/checkout/webhook" impl MarketplaceDatabase, PaymentGateway);
/// Receives payment notifications from the gateway.
///
/// This route is not authenticated. The notification itself is never trusted: only the payment id is used, and the
/// status is always fetched from the gateway before anything changes.
///
/// The gateway retries anything that is not a 2xx, so this handler always answers `200 OK`. Failures are queued and
/// retried by the webhook retry worker instead.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<WebhookReconcilerApi<B, G>>,
) -> HttpResponse
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let peer_addr = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!("💻️ Payment notification received from {peer_addr:?}");
    let notification = match parse_notification(&body, webhook_query_params(req.query_string())) {
        Some(n) => n,
        None => {
            warn!("💻️ Could not make sense of a payment notification: {}", String::from_utf8_lossy(&body));
            return HttpResponse::Ok().json(JsonResponse::failure("Notification not understood."));
        },
    };
    trace!("💻️ Notification: {notification:?}");
    let result = match api.handle_notification(notification).await {
        WebhookOutcome::Ignored => JsonResponse::success("Ignored."),
        WebhookOutcome::Unmatched(payment_id) => {
            info!("💻️ Payment {payment_id} does not belong to any order");
            JsonResponse::success("No matching order.")
        },
        WebhookOutcome::Applied(change) => {
            let order = change.order();
            info!("💻️ Order {} is {} after the notification", order.order_number, order.status);
            JsonResponse::success(format!("Order {} is {}.", order.order_number, order.status))
        },
        WebhookOutcome::Queued(id) => JsonResponse::success(format!("Notification {id} queued for retry.")),
        WebhookOutcome::Dropped(id) => JsonResponse::failure(format!("Notification {id} could not be processed.")),
    };
    HttpResponse::Ok().json(result)
}

/// An unreadable query string (repeated keys, bad encoding) is treated as carrying no notification, rather than
/// failing the request before the body has been looked at.
fn webhook_query_params(query: &str) -> WebhookQueryParams {
    web::Query::<WebhookQueryParams>::from_query(query)
        .map(web::Query::into_inner)
        .unwrap_or_else(|e| {
            debug!("💻️ Ignoring an unreadable notification query string '{query}'. {e}");
            WebhookQueryParams::default()
        })
}

/// The JSON body wins. If it is missing or unreadable, the query string is tried.
fn parse_notification(body: &[u8], query: WebhookQueryParams) -> Option<WebhookNotification> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<WebhookNotification>(body)
            .map_err(|e| debug!("💻️ Notification body is not valid JSON. {e}"))
            .ok()
            .filter(|n| n.payment_id().is_some() || !n.is_payment())
    };
    from_body.or_else(|| query.into_notification())
}

//----------------------------------------------   Shipping  ----------------------------------------------------
route!(calculate_shipping => Post "/shipping/calculate" impl MarketplaceDatabase, ShippingAggregator);
/// Quotes shipping for a parcel. Never fails because of the aggregator: a fixed table is used when it is down.
pub async fn calculate_shipping<B, S>(
    body: web::Json<ShippingCalculateRequest>,
    api: web::Data<ShipmentApi<B>>,
    aggregator: web::Data<S>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    S: ShippingAggregator,
{
    let request = body.into_inner();
    debug!("💻️ POST calculate_shipping to {}", request.to_zipcode);
    let declared_value = match (request.product_id, request.declared_value) {
        (_, Some(value)) => value,
        (Some(product_id), None) => {
            let product = api.db().fetch_product(product_id).await?;
            product.map(|p| p.price).unwrap_or(DEFAULT_DECLARED_VALUE)
        },
        (None, None) => DEFAULT_DECLARED_VALUE,
    };
    let quote_request = request.into_quote_request(declared_value)?;
    let quotes = api.calculate_shipping(aggregator.as_ref(), quote_request).await;
    Ok(HttpResponse::Ok().json(quotes))
}

const DEFAULT_DECLARED_VALUE: Cents = Cents::from_cents(5_000);

route!(mark_shipped => Post "/shipping/mark-shipped" impl MarketplaceDatabase);
pub async fn mark_shipped<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<MarkShippedRequest>,
    api: web::Data<ShipmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let MarkShippedRequest { order_id, tracking_code, carrier } = body.into_inner();
    debug!("💻️ POST mark_shipped for order {order_id} by user #{}", claims.user_id());
    let order = api.mark_shipped(claims.actor(), order_id, &tracking_code, carrier).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(track_shipment => Get "/shipping/track/{tracking_code}" impl MarketplaceDatabase, ShippingAggregator);
pub async fn track_shipment<B, S>(
    path: web::Path<String>,
    api: web::Data<ShipmentApi<B>>,
    aggregator: web::Data<S>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    S: ShippingAggregator,
{
    let code = path.into_inner();
    debug!("💻️ GET track_shipment({code})");
    let info = api.track(aggregator.as_ref(), &code).await?;
    Ok(HttpResponse::Ok().json(info))
}

route!(create_label => Post "/shipping/create" impl MarketplaceDatabase, ShippingAggregator);
/// Buys a postage label from the aggregator for a paid order. Only the seller (or an admin) may do this.
pub async fn create_label<B, S>(
    claims: JwtClaims,
    body: web::Json<CreateLabelRequest>,
    api: web::Data<ShipmentApi<B>>,
    aggregator: web::Data<S>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    S: ShippingAggregator,
{
    let CreateLabelRequest { order_id, service_id } = body.into_inner();
    debug!("💻️ POST create_label for order {order_id} (service {service_id}) by user #{}", claims.user_id());
    let label = api.purchase_label(aggregator.as_ref(), label_actor(&claims), order_id, service_id).await?;
    Ok(HttpResponse::Created().json(label))
}

route!(label_url => Get "/shipping/label/{order_id}" impl MarketplaceDatabase, ShippingAggregator);
pub async fn label_url<B, S>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ShipmentApi<B>>,
    aggregator: web::Data<S>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    S: ShippingAggregator,
{
    let order_id = path.into_inner();
    debug!("💻️ GET label_url for order {order_id} by user #{}", claims.user_id());
    let label_url = api.label_url(aggregator.as_ref(), label_actor(&claims), order_id).await?;
    Ok(HttpResponse::Ok().json(LabelUrlResponse { label_url }))
}

route!(cancel_label => Post "/shipping/cancel" impl MarketplaceDatabase, ShippingAggregator);
/// Cancels the order's label. Not possible once the parcel has been handed to the carrier.
pub async fn cancel_label<B, S>(
    claims: JwtClaims,
    body: web::Json<LabelOrderRequest>,
    api: web::Data<ShipmentApi<B>>,
    aggregator: web::Data<S>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    S: ShippingAggregator,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST cancel_label for order {order_id} by user #{}", claims.user_id());
    let label = api.cancel_label(aggregator.as_ref(), label_actor(&claims), order_id).await?;
    Ok(HttpResponse::Ok().json(label))
}

fn label_actor(claims: &JwtClaims) -> Actor {
    if claims.has_role(Role::Admin) {
        Actor::Admin
    } else {
        claims.actor()
    }
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(balance => Get "/payments/balance" impl LedgerManagement);
pub async fn balance<B: LedgerManagement>(
    claims: JwtClaims,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET balance for user #{}", claims.user_id());
    let balance = api.balance(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(transactions => Get "/payments/transactions" impl LedgerManagement);
/// The caller's ledger entries, most recent first. Filter with `?type=sale|cashback|withdrawal`, `?status=` and
/// `?limit=`.
pub async fn transactions<B: LedgerManagement>(
    claims: JwtClaims,
    query: web::Query<TransactionQueryParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET transactions for user #{}", claims.user_id());
    let params = query.into_inner();
    let mut filter = TransactionQueryFilter::for_user(claims.user_id()).with_limit(params.limit());
    if let Some(tx_type) = params.tx_type {
        filter = filter.with_type(tx_type);
    }
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    let entries = api.transactions(filter).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(request_withdrawal => Post "/payments/withdraw" impl LedgerManagement);
pub async fn request_withdrawal<B: LedgerManagement>(
    claims: JwtClaims,
    body: web::Json<WithdrawalRequest>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let amount = body.into_inner().amount;
    debug!("💻️ POST withdrawal of {amount} for user #{}", claims.user_id());
    let tx = api.request_withdrawal(claims.user_id(), amount).await?;
    Ok(HttpResponse::Created().json(tx))
}

route!(list_withdrawals => Get "/payments/withdrawals" impl LedgerManagement where requires [Role::Admin]);
pub async fn list_withdrawals<B: LedgerManagement>(
    query: web::Query<WithdrawalListParams>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let status = query.into_inner().status;
    debug!("💻️ GET list_withdrawals({status:?})");
    let withdrawals = api.list_withdrawals(status).await?;
    Ok(HttpResponse::Ok().json(withdrawals))
}

route!(resolve_withdrawal => Post "/payments/withdrawals/{withdrawal_id}/{action}" impl LedgerManagement where requires [Role::Admin]);
/// Approve or reject a pending withdrawal. Rejecting it returns the funds to the seller's balance.
pub async fn resolve_withdrawal<B: LedgerManagement>(
    claims: JwtClaims,
    path: web::Path<(i64, WithdrawalAction)>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (withdrawal_id, action) = path.into_inner();
    info!("💻️ Admin #{} is resolving withdrawal #{withdrawal_id}: {action:?}", claims.user_id());
    let resolution = match action {
        WithdrawalAction::Approve => api.approve(withdrawal_id).await?,
        WithdrawalAction::Reject => api.reject(withdrawal_id).await?,
    };
    Ok(HttpResponse::Ok().json(resolution))
}

route!(verify_ledger => Get "/payments/ledger/{user_id}/verify" impl LedgerManagement where requires [Role::Admin]);
/// Replays a user's ledger and compares it to the cached balances.
pub async fn verify_ledger<B: LedgerManagement>(
    path: web::Path<i64>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET verify_ledger({user_id})");
    let verification = api.verify(user_id).await?;
    if !verification.consistent {
        warn!("💻️ The cached balance for user #{user_id} does not match the ledger: {verification:?}");
    }
    Ok(HttpResponse::Ok().json(verification))
}
