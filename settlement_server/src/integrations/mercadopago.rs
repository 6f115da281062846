//! The payment gateway, backed by Mercado Pago.
use chrono::{DateTime, Utc};
use gateway_tools::{
    digits_only,
    mp_objects::{MpIdentification, MpPayer, MpPayerAddress, MpPayment, MpPaymentRequest},
    GatewayApiError,
    MercadoPagoApi,
    MercadoPagoConfig,
};
use log::*;
use settle_common::Cents;
use settlement_engine::{
    db_types::{Address, PaymentMethod},
    payment_objects::{
        GatewayPayment,
        GatewayStatus,
        PayerProfile,
        PaymentDetails,
        PaymentHandle,
        PaymentInstructions,
        PaymentRequest,
    },
    traits::{GatewayError, PaymentGateway},
};

use crate::integrations::gateway_error;

const PIX_METHOD_ID: &str = "pix";
const BOLETO_METHOD_ID: &str = "bolbradesco";

#[derive(Clone)]
pub struct MercadoPagoGateway {
    api: MercadoPagoApi,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, GatewayApiError> {
        let api = MercadoPagoApi::new(config)?;
        Ok(Self { api })
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if self.api.config().is_configured() {
            Ok(())
        } else {
            Err(GatewayError::NotConfigured("No Mercado Pago access token has been set".into()))
        }
    }
}

impl PaymentGateway for MercadoPagoGateway {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        self.check_configured()?;
        let method = request.details.method();
        let key = idempotency_key(&request);
        let payment = self.api.create_payment(to_mp_request(request), &key).await.map_err(gateway_error)?;
        Ok(payment_handle(payment, method))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.check_configured()?;
        let payment = self.api.get_payment(payment_id).await.map_err(gateway_error)?;
        Ok(gateway_payment(payment))
    }
}

/// Resubmitting a PIX or boleto checkout for the same order returns the original payment. Card tokens are single
/// use, so each token gets its own key.
fn idempotency_key(request: &PaymentRequest) -> String {
    let reference = request.external_reference();
    match &request.details {
        PaymentDetails::Card(card) => format!("order-{reference}-card-{}", card.token),
        details => format!("order-{reference}-{}", details.method()),
    }
}

fn to_mp_request(request: PaymentRequest) -> MpPaymentRequest {
    let external_reference = request.external_reference();
    let payer = to_mp_payer(request.payer);
    let transaction_amount = request.amount.as_decimal();
    let (payment_method_id, token, installments, issuer_id) = match request.details {
        PaymentDetails::Pix => (PIX_METHOD_ID.to_string(), None, None, None),
        PaymentDetails::Boleto => (BOLETO_METHOD_ID.to_string(), None, None, None),
        PaymentDetails::Card(card) => {
            (card.payment_method_id, Some(card.token), Some(card.installments), card.issuer_id)
        },
    };
    MpPaymentRequest {
        transaction_amount,
        description: request.description,
        payment_method_id,
        token,
        installments,
        issuer_id,
        payer,
        external_reference,
        notification_url: None,
    }
}

fn to_mp_payer(payer: PayerProfile) -> MpPayer {
    let non_empty = |s: String| Some(s).filter(|s| !s.trim().is_empty());
    MpPayer {
        email: payer.email,
        first_name: non_empty(payer.first_name),
        last_name: non_empty(payer.last_name),
        identification: payer.cpf.map(|cpf| MpIdentification::cpf(digits_only(&cpf))),
        address: payer.address.map(to_mp_address),
    }
}

fn to_mp_address(address: Address) -> MpPayerAddress {
    MpPayerAddress {
        zip_code: digits_only(&address.zipcode),
        street_name: address.street,
        street_number: address.number,
        neighborhood: address.neighborhood,
        city: address.city,
        federal_unit: address.state,
    }
}

fn payment_handle(payment: MpPayment, method: PaymentMethod) -> PaymentHandle {
    let expires_at = payment.date_of_expiration.as_deref().and_then(parse_gateway_date);
    let instructions = match method {
        PaymentMethod::Pix => {
            let data = payment.transaction_data().cloned().unwrap_or_default();
            PaymentInstructions::Pix {
                qr_code: data.qr_code,
                qr_code_base64: data.qr_code_base64,
                ticket_url: data.ticket_url,
                expires_at,
            }
        },
        PaymentMethod::Card => PaymentInstructions::Card {
            authorization_code: payment.authorization_code.clone(),
            last_four_digits: payment.card.as_ref().and_then(|c| c.last_four_digits.clone()),
        },
        PaymentMethod::Boleto => PaymentInstructions::Boleto {
            boleto_url: payment.transaction_details.as_ref().and_then(|d| d.external_resource_url.clone()),
            barcode: payment.barcode.as_ref().and_then(|b| b.content.clone()),
            expires_at,
        },
    };
    PaymentHandle {
        payment_id: payment.id,
        status: GatewayStatus::from(payment.status.as_str()),
        status_detail: payment.status_detail,
        instructions,
    }
}

fn gateway_payment(payment: MpPayment) -> GatewayPayment {
    let details = payment.transaction_details.unwrap_or_default();
    GatewayPayment {
        payment_id: payment.id,
        status: GatewayStatus::from(payment.status.as_str()),
        status_detail: payment.status_detail,
        amount: payment.transaction_amount.map(Cents::from_decimal).unwrap_or_default(),
        paid_amount: details.total_paid_amount.map(Cents::from_decimal),
        net_amount: details.net_received_amount.map(Cents::from_decimal),
        external_reference: payment.external_reference,
    }
}

/// Mercado Pago dates carry a local offset, e.g. `2024-06-02T12:00:00.000-04:00`.
fn parse_gateway_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| debug!("🔄️ Could not parse gateway date '{s}'. {e}"))
        .ok()
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use settlement_engine::{db_types::OrderNumber, payment_objects::CardDetails};

    use super::*;

    fn request(details: PaymentDetails) -> PaymentRequest {
        PaymentRequest {
            order_id: 42,
            order_number: OrderNumber("AP2024060001".into()),
            amount: Cents::from(11_500),
            description: "Pedido #AP2024060001".into(),
            payer: PayerProfile {
                email: "maria@example.com".into(),
                first_name: "Maria".into(),
                last_name: String::new(),
                cpf: Some("123.456.789-09".into()),
                address: Some(Address {
                    id: 1,
                    user_id: 2,
                    street: "Rua das Flores".into(),
                    number: "100".into(),
                    neighborhood: "Centro".into(),
                    city: "Passo Fundo".into(),
                    state: "RS".into(),
                    zipcode: "99010-000".into(),
                }),
            },
            details,
        }
    }

    #[test]
    fn pix_request() {
        let mp = to_mp_request(request(PaymentDetails::Pix));
        assert_eq!(mp.payment_method_id, "pix");
        assert!((mp.transaction_amount - 115.0).abs() < f64::EPSILON);
        assert_eq!(mp.external_reference, "42");
        assert!(mp.token.is_none());
        assert_eq!(mp.payer.last_name, None);
        assert_eq!(mp.payer.identification.unwrap().number, "12345678909");
        assert_eq!(mp.payer.address.unwrap().zip_code, "99010000");
    }

    #[test]
    fn card_request_and_keys() {
        let card = CardDetails {
            token: "tok_1".into(),
            installments: 3,
            payment_method_id: "master".into(),
            issuer_id: Some("24".into()),
        };
        let req = request(PaymentDetails::Card(card));
        assert_eq!(idempotency_key(&req), "order-42-card-tok_1");
        let mp = to_mp_request(req);
        assert_eq!(mp.payment_method_id, "master");
        assert_eq!(mp.installments, Some(3));
        assert_eq!(mp.issuer_id.as_deref(), Some("24"));
        assert_eq!(idempotency_key(&request(PaymentDetails::Boleto)), "order-42-boleto");
        assert_eq!(to_mp_request(request(PaymentDetails::Boleto)).payment_method_id, "bolbradesco");
    }

    #[test]
    fn pix_handle() {
        let json = serde_json::json!({
            "id": 1319728357,
            "status": "pending",
            "status_detail": "pending_waiting_transfer",
            "transaction_amount": 115.0,
            "external_reference": "42",
            "date_of_expiration": "2024-06-02T12:00:00.000-04:00",
            "point_of_interaction": { "transaction_data": { "qr_code": "00020126", "qr_code_base64": "iVBOR" } }
        });
        let payment: MpPayment = serde_json::from_value(json).unwrap();
        let handle = payment_handle(payment.clone(), PaymentMethod::Pix);
        assert_eq!(handle.payment_id, "1319728357");
        assert_eq!(handle.status, GatewayStatus::Pending);
        let expected_expiry = Utc.with_ymd_and_hms(2024, 6, 2, 16, 0, 0).unwrap();
        match handle.instructions {
            PaymentInstructions::Pix { qr_code, expires_at, .. } => {
                assert_eq!(qr_code.as_deref(), Some("00020126"));
                assert_eq!(expires_at, Some(expected_expiry));
            },
            other => panic!("Expected PIX instructions, got {other:?}"),
        }
        let fetched = gateway_payment(payment);
        assert_eq!(fetched.amount, Cents::from(11_500));
        assert_eq!(fetched.paid_amount, None);
        assert_eq!(fetched.external_reference.as_deref(), Some("42"));
    }
}
