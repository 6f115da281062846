#![allow(dead_code)]
//! A complete engine wired to a fresh database, the fake gateway and a notification collector.
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use settle_common::Cents;
use settlement_engine::{
    db_types::{Address, NewNotification, Order, PaymentMethod, Product, SubscriptionTier, UserProfile},
    events::{EventHandler, EventProducers, Handler, NotificationEvent},
    order_objects::Actor,
    payment_objects::{GatewayStatus, PaymentDetails, WebhookNotification},
    test_utils::{
        fakes::FakeGateway,
        prepare_env::{drop_database, fresh_database},
        seed::{seed_address, seed_product, seed_user},
    },
    AccountApi,
    CommissionPolicy,
    LedgerApi,
    OrderFactoryApi,
    OrderFlowApi,
    PaymentApi,
    PurchaseRequest,
    RetryPolicy,
    ShipmentApi,
    SqliteDatabase,
    WebhookReconcilerApi,
    WithdrawalApi,
};

pub struct Market {
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub factory: OrderFactoryApi<SqliteDatabase>,
    pub flow: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, FakeGateway>,
    pub reconciler: WebhookReconcilerApi<SqliteDatabase, FakeGateway>,
    pub shipments: ShipmentApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub withdrawals: WithdrawalApi<SqliteDatabase>,
    pub accounts: AccountApi<SqliteDatabase>,
    notifications: EventHandler<NotificationEvent>,
    sent: Arc<Mutex<Vec<NewNotification>>>,
}

pub struct Parties {
    pub buyer: UserProfile,
    pub seller: UserProfile,
    pub address: Address,
    pub product: Product,
}

impl Market {
    pub async fn new() -> Self {
        let db = fresh_database(5).await;
        let gateway = FakeGateway::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let handler: Handler<NotificationEvent> = Arc::new(move |ev: NotificationEvent| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push(ev.notification);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let notifications = EventHandler::new(512, handler);
        let mut producers = EventProducers::default();
        producers.notification_producer.push(notifications.subscribe());
        let policy = CommissionPolicy::default();
        let immediate_retries =
            RetryPolicy { max_attempts: 3, base_delay: chrono::Duration::zero(), max_delay: chrono::Duration::zero() };
        Self {
            factory: OrderFactoryApi::new(db.clone(), producers.clone(), policy.clone()),
            flow: OrderFlowApi::new(db.clone(), producers.clone()),
            payments: PaymentApi::new(db.clone(), gateway.clone(), producers.clone()),
            reconciler: WebhookReconcilerApi::new(db.clone(), gateway.clone(), producers.clone())
                .with_retry_policy(immediate_retries),
            shipments: ShipmentApi::new(db.clone(), producers.clone(), policy),
            ledger: LedgerApi::new(db.clone()),
            withdrawals: WithdrawalApi::new(db.clone(), producers),
            accounts: AccountApi::new(db.clone()),
            db,
            gateway,
            notifications,
            sent,
        }
    }

    /// A free-tier buyer and seller, the buyer's address and an active product priced `price`.
    pub async fn parties(&self, price: Cents) -> Parties {
        let seller = seed_user(&self.db, "Maria Vendedora", SubscriptionTier::Free).await;
        let buyer = seed_user(&self.db, "João Comprador", SubscriptionTier::Free).await;
        let address = seed_address(&self.db, buyer.id).await;
        let product = seed_product(&self.db, seller.id, price).await;
        Parties { buyer, seller, address, product }
    }

    pub async fn buy(&self, parties: &Parties, method: PaymentMethod) -> Order {
        let request = PurchaseRequest {
            buyer_id: parties.buyer.id,
            product_id: parties.product.id,
            address_id: Some(parties.address.id),
            payment_method: method,
            shipping: None,
        };
        self.factory.create_order(request).await.expect("Error creating order")
    }

    /// Creates a PIX payment for the order and returns its gateway id.
    pub async fn pay_with_pix(&self, order: &Order) -> String {
        let result =
            self.payments.checkout(order.buyer_id, order.id, PaymentDetails::Pix).await.expect("Error during checkout");
        result.payment.payment_id
    }

    /// The gateway approves the payment and tells us about it.
    pub async fn approve(&self, payment_id: &str) {
        self.gateway.set_status(payment_id, GatewayStatus::Approved);
        let _ = self.reconciler.handle_notification(WebhookNotification::for_payment(payment_id)).await;
    }

    /// Takes a fresh order all the way to `delivered`.
    pub async fn delivered_order(&self, parties: &Parties) -> Order {
        let order = self.buy(parties, PaymentMethod::Pix).await;
        let payment_id = self.pay_with_pix(&order).await;
        self.approve(&payment_id).await;
        self.shipments
            .mark_shipped(Actor::User(parties.seller.id), order.id, "BR123456789BR", Some("Correios".into()))
            .await
            .expect("Error marking order as shipped");
        self.shipments.mark_delivered(Actor::System, order.id).await.expect("Error marking order as delivered")
    }

    /// Drops the engine, waits for every published notification to be handled, and removes the database.
    pub async fn finish(self) -> Vec<NewNotification> {
        let Market { db, factory, flow, payments, reconciler, shipments, withdrawals, notifications, sent, .. } = self;
        drop((factory, flow, payments, reconciler, shipments, withdrawals));
        notifications.start_handler().await;
        drop_database(db).await;
        let sent = sent.lock().unwrap().clone();
        sent
    }
}

pub fn count_kind(notifications: &[NewNotification], kind: &str) -> usize {
    notifications.iter().filter(|n| n.kind == kind).count()
}
