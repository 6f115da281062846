//! In-memory stand-ins for the payment gateway and the shipping aggregator.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use settle_common::Cents;

use crate::{
    payment_objects::{GatewayPayment, GatewayStatus, PaymentDetails, PaymentHandle, PaymentInstructions, PaymentRequest},
    shipping_objects::{LabelRequest, PurchasedLabel, ShippingOption, ShippingQuoteRequest, TrackingInfo},
    traits::{GatewayError, PaymentGateway, ShippingAggregator},
};

#[derive(Debug, Default)]
struct GatewayState {
    payments: HashMap<String, GatewayPayment>,
    create_status: Option<GatewayStatus>,
    create_failure: Option<GatewayError>,
    failing_fetches: usize,
    next_id: u64,
    fetch_calls: usize,
}

/// A payment gateway that keeps payments in memory. Payments start `pending` unless told otherwise, and their status
/// can be changed at any time to simulate the gateway processing them.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// New payments are created with this status. Card payments are usually decided immediately.
    pub fn create_with_status(&self, status: GatewayStatus) {
        self.lock().create_status = Some(status);
    }

    pub fn fail_next_create(&self, error: GatewayError) {
        self.lock().create_failure = Some(error);
    }

    /// The next `n` status lookups time out.
    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    pub fn set_status(&self, payment_id: &str, status: GatewayStatus) {
        if let Some(p) = self.lock().payments.get_mut(payment_id) {
            p.status = status;
        }
    }

    /// Registers a payment the engine has never seen, e.g. one created just before a crash.
    pub fn insert_payment(&self, payment: GatewayPayment) {
        self.lock().payments.insert(payment.payment_id.clone(), payment);
    }

    pub fn payment_count(&self) -> usize {
        self.lock().payments.len()
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().expect("Gateway state lock poisoned")
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        let mut state = self.lock();
        if let Some(e) = state.create_failure.take() {
            return Err(e);
        }
        state.next_id += 1;
        let payment_id = format!("{}", 9_000_000 + state.next_id);
        let status = state.create_status.clone().unwrap_or(GatewayStatus::Pending);
        let instructions = match &request.details {
            PaymentDetails::Pix => PaymentInstructions::Pix {
                qr_code: Some(format!("00020126580014br.gov.bcb.pix{payment_id}")),
                qr_code_base64: Some("iVBORw0KGgo=".into()),
                ticket_url: None,
                expires_at: None,
            },
            PaymentDetails::Card(_) => {
                PaymentInstructions::Card { authorization_code: Some("A1B2C3".into()), last_four_digits: Some("4242".into()) }
            },
            PaymentDetails::Boleto => PaymentInstructions::Boleto {
                boleto_url: Some(format!("https://boleto.example.com/{payment_id}")),
                barcode: Some("23793381286000000000000000000000000000000000".into()),
                expires_at: None,
            },
        };
        let payment = GatewayPayment {
            payment_id: payment_id.clone(),
            status: status.clone(),
            status_detail: None,
            amount: request.amount,
            paid_amount: None,
            net_amount: None,
            external_reference: Some(request.external_reference()),
        };
        state.payments.insert(payment_id.clone(), payment);
        Ok(PaymentHandle { payment_id, status, status_detail: None, instructions })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let mut state = self.lock();
        state.fetch_calls += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(GatewayError::Timeout(format!("Lookup of payment {payment_id} timed out")));
        }
        state
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Refused(format!("Payment {payment_id} not found")))
    }
}

/// A shipping aggregator with a fixed quote and scriptable tracking statuses. Labels are kept in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeCarrier {
    statuses: Arc<Mutex<HashMap<String, String>>>,
    offline: Arc<Mutex<bool>>,
    labels: Arc<Mutex<Vec<(LabelRequest, bool)>>>,
}

impl FakeCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().expect("Carrier lock poisoned") = offline;
    }

    pub fn set_status(&self, tracking_code: &str, status: &str) {
        self.statuses.lock().expect("Carrier lock poisoned").insert(tracking_code.to_string(), status.to_string());
    }

    /// The request behind a label, and whether it is still live.
    pub fn label(&self, label_id: &str) -> Option<(LabelRequest, bool)> {
        let index = label_index(label_id)?;
        self.labels.lock().expect("Carrier lock poisoned").get(index).cloned()
    }

    fn is_offline(&self) -> bool {
        *self.offline.lock().expect("Carrier lock poisoned")
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.is_offline() {
            return Err(GatewayError::Transport("Carrier is offline".into()));
        }
        Ok(())
    }
}

fn label_index(label_id: &str) -> Option<usize> {
    label_id.strip_prefix("label-")?.parse::<usize>().ok()?.checked_sub(1)
}

impl ShippingAggregator for FakeCarrier {
    async fn quote(&self, _request: ShippingQuoteRequest) -> Result<Vec<ShippingOption>, GatewayError> {
        if self.is_offline() {
            return Err(GatewayError::Transport("Carrier is offline".into()));
        }
        Ok(vec![
            ShippingOption {
                id: 1,
                name: "PAC".into(),
                company: "Correios".into(),
                price: Cents::from(2_190),
                delivery_days: 8,
                delivery_min: 6,
                delivery_max: 8,
            },
            ShippingOption {
                id: 2,
                name: "SEDEX".into(),
                company: "Correios".into(),
                price: Cents::from(3_850),
                delivery_days: 3,
                delivery_min: 2,
                delivery_max: 3,
            },
        ])
    }

    async fn track(&self, tracking_code: &str) -> Result<TrackingInfo, GatewayError> {
        if self.is_offline() {
            return Err(GatewayError::Transport("Carrier is offline".into()));
        }
        let status = self
            .statuses
            .lock()
            .expect("Carrier lock poisoned")
            .get(tracking_code)
            .cloned()
            .ok_or_else(|| GatewayError::Refused(format!("Unknown tracking code {tracking_code}")))?;
        Ok(TrackingInfo { tracking_code: tracking_code.to_string(), current_status: status, delivered_at: None, events: vec![] })
    }

    async fn purchase_label(&self, request: LabelRequest) -> Result<PurchasedLabel, GatewayError> {
        self.check_online()?;
        let mut labels = self.labels.lock().expect("Carrier lock poisoned");
        labels.push((request, true));
        let n = labels.len();
        Ok(PurchasedLabel {
            label_id: format!("label-{n}"),
            protocol: Some(format!("ORD-2024{n:08}")),
            price: Cents::from(2_190),
        })
    }

    async fn label_url(&self, label_id: &str) -> Result<String, GatewayError> {
        self.check_online()?;
        match self.label(label_id) {
            Some((_, true)) => Ok(format!("https://labels.test/{label_id}.pdf")),
            _ => Err(GatewayError::Refused(format!("Label {label_id} is not printable"))),
        }
    }

    async fn cancel_label(&self, label_id: &str) -> Result<(), GatewayError> {
        self.check_online()?;
        let index = label_index(label_id).ok_or_else(|| GatewayError::Refused(format!("Unknown label {label_id}")))?;
        let mut labels = self.labels.lock().expect("Carrier lock poisoned");
        match labels.get_mut(index) {
            Some((_, live)) if *live => {
                *live = false;
                Ok(())
            },
            _ => Err(GatewayError::Refused(format!("Label {label_id} cannot be cancelled"))),
        }
    }
}
