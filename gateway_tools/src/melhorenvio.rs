use std::{collections::HashMap, sync::Arc};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MelhorEnvioConfig,
    helpers::digits_only,
    me_objects::{
        MeCalculateRequest,
        MeCartItem,
        MeCartRequest,
        MeOrdersRequest,
        MePrintRequest,
        MePrintResponse,
        MeQuote,
        MeTracking,
    },
    GatewayApiError,
};

/// Client for the Melhor Envio shipping API.
#[derive(Clone)]
pub struct MelhorEnvioApi {
    config: MelhorEnvioConfig,
    client: Arc<Client>,
}

impl MelhorEnvioApi {
    pub fn new(config: MelhorEnvioConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(4);
        let bearer = format!("Bearer {}", config.token.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        let agent =
            HeaderValue::from_str(&config.user_agent).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(USER_AGENT, agent);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &MelhorEnvioConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        if !self.config.is_configured() {
            return Err(GatewayApiError::NotConfigured("No Melhor Envio token".into()));
        }
        let url = self.url(path);
        trace!("📦️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(GatewayApiError::from_reqwest)?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Quotes every enabled service. Services the carrier reports as unavailable are dropped.
    pub async fn calculate(&self, mut request: MeCalculateRequest) -> Result<Vec<MeQuote>, GatewayApiError> {
        request.from.postal_code = match digits_only(&request.from.postal_code) {
            s if s.is_empty() => self.config.origin_zipcode.clone(),
            s => s,
        };
        request.to.postal_code = digits_only(&request.to.postal_code);
        debug!("📦️ Quoting shipping from {} to {}", request.from.postal_code, request.to.postal_code);
        let quotes =
            self.rest_query::<Vec<MeQuote>, _>(Method::POST, "/me/shipment/calculate", &[], Some(request)).await?;
        let total = quotes.len();
        let available = quotes.into_iter().filter(MeQuote::is_available).collect::<Vec<_>>();
        trace!("📦️ {} of {total} services are available", available.len());
        Ok(available)
    }

    /// Tracking details for a single parcel. `None` if the aggregator does not know the code.
    pub async fn track(&self, tracking_code: &str) -> Result<Option<MeTracking>, GatewayApiError> {
        debug!("📦️ Tracking {tracking_code}");
        let params = [("orders", tracking_code)];
        let mut result = self
            .rest_query::<HashMap<String, MeTracking>, ()>(Method::GET, "/me/shipment/tracking", &params, None)
            .await?;
        Ok(result.remove(tracking_code))
    }

    /// Puts a label in the account's cart. It is not paid for until [`Self::checkout`].
    pub async fn add_to_cart(&self, request: MeCartRequest) -> Result<MeCartItem, GatewayApiError> {
        debug!("📦️ Adding a service {} label to the cart for {}", request.service, request.to.postal_code);
        self.rest_query::<MeCartItem, _>(Method::POST, "/me/cart", &[], Some(request)).await
    }

    /// Pays for the given cart items from the account wallet.
    pub async fn checkout(&self, ids: MeOrdersRequest) -> Result<serde_json::Value, GatewayApiError> {
        debug!("📦️ Checking out labels {:?}", ids.orders);
        self.rest_query::<serde_json::Value, _>(Method::POST, "/me/shipment/checkout", &[], Some(ids)).await
    }

    pub async fn generate_labels(&self, ids: MeOrdersRequest) -> Result<serde_json::Value, GatewayApiError> {
        debug!("📦️ Generating labels {:?}", ids.orders);
        self.rest_query::<serde_json::Value, _>(Method::POST, "/me/shipment/generate", &[], Some(ids)).await
    }

    /// A public URL to the printable PDF of the given labels.
    pub async fn print_labels(&self, ids: MeOrdersRequest) -> Result<String, GatewayApiError> {
        let request = MePrintRequest { mode: "public".into(), orders: ids.orders };
        let response =
            self.rest_query::<MePrintResponse, _>(Method::POST, "/me/shipment/print", &[], Some(request)).await?;
        Ok(response.url)
    }

    pub async fn cancel_labels(&self, ids: MeOrdersRequest) -> Result<serde_json::Value, GatewayApiError> {
        info!("📦️ Cancelling labels {:?}", ids.orders);
        self.rest_query::<serde_json::Value, _>(Method::POST, "/me/shipment/cancel", &[], Some(ids)).await
    }
}
