use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MercadoPagoConfig,
    mp_objects::{MpErrorResponse, MpPayment, MpPaymentRequest},
    GatewayApiError,
};

/// Client for the Mercado Pago payments API.
///
/// Requests are sent exactly once. Retrying is the caller's decision, since a payment creation that timed out may
/// still have gone through.
#[derive(Clone)]
pub struct MercadoPagoApi {
    config: MercadoPagoConfig,
    client: Arc<Client>,
}

impl MercadoPagoApi {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.access_token.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &MercadoPagoConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        if !self.config.is_configured() {
            return Err(GatewayApiError::NotConfigured("No Mercado Pago access token".into()));
        }
        let url = self.url(path);
        trace!("🪝️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("X-Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(GatewayApiError::from_reqwest)?;
        if response.status().is_success() {
            trace!("🪝️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            let message = serde_json::from_str::<MpErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or(text);
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Creates a payment. The idempotency key makes a resubmission of the same request return the original payment.
    pub async fn create_payment(
        &self,
        mut request: MpPaymentRequest,
        idempotency_key: &str,
    ) -> Result<MpPayment, GatewayApiError> {
        if request.notification_url.is_none() {
            request.notification_url = self.config.notification_url.clone();
        }
        debug!(
            "🪝️ Creating {} payment of {:.2} for reference {}",
            request.payment_method_id, request.transaction_amount, request.external_reference
        );
        let payment =
            self.rest_query::<MpPayment, _>(Method::POST, "/v1/payments", Some(idempotency_key), Some(request)).await?;
        info!("🪝️ Created payment {} ({})", payment.id, payment.status);
        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<MpPayment, GatewayApiError> {
        let path = format!("/v1/payments/{payment_id}");
        debug!("🪝️ Fetching payment {payment_id}");
        let payment = self.rest_query::<MpPayment, ()>(Method::GET, &path, None, None).await?;
        trace!("🪝️ Payment {payment_id} is {}", payment.status);
        Ok(payment)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use settle_common::Secret;

    use super::*;

    #[tokio::test]
    async fn unconfigured_client_refuses_to_send() {
        let config = MercadoPagoConfig {
            access_token: Secret::new(String::new()),
            base_url: "http://127.0.0.1:9".into(),
            notification_url: None,
            timeout: Duration::from_millis(100),
        };
        let api = MercadoPagoApi::new(config).unwrap();
        let err = api.get_payment("123").await.unwrap_err();
        assert!(matches!(err, GatewayApiError::NotConfigured(_)));
    }

    #[test]
    fn urls() {
        let config = MercadoPagoConfig { base_url: "https://api.mercadopago.com/".into(), ..Default::default() };
        let api = MercadoPagoApi::new(config).unwrap();
        assert_eq!(api.url("/v1/payments/1"), "https://api.mercadopago.com/v1/payments/1");
    }
}
