use std::time::Duration;

use log::*;
use settle_common::{env_flag, Secret};

const DEFAULT_MP_BASE_URL: &str = "https://api.mercadopago.com";
const DEFAULT_MP_TIMEOUT_MS: u64 = 10_000;
const ME_PRODUCTION_URL: &str = "https://melhorenvio.com.br/api/v2";
const ME_SANDBOX_URL: &str = "https://sandbox.melhorenvio.com.br/api/v2";
const DEFAULT_ORIGIN_ZIPCODE: &str = "99010000";

#[derive(Debug, Clone, Default)]
pub struct MercadoPagoConfig {
    pub access_token: Secret<String>,
    pub base_url: String,
    /// Where the gateway posts payment notifications. Omitted from requests when empty.
    pub notification_url: Option<String>,
    pub timeout: Duration,
}

impl MercadoPagoConfig {
    pub fn new_from_env_or_default() -> Self {
        let access_token = Secret::new(std::env::var("MKT_MP_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ MKT_MP_ACCESS_TOKEN not set. Payment requests will be refused by the gateway.");
            String::default()
        }));
        let base_url = std::env::var("MKT_MP_BASE_URL").unwrap_or_else(|_| DEFAULT_MP_BASE_URL.to_string());
        let notification_url = std::env::var("MKT_MP_NOTIFICATION_URL").ok().filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            warn!("🪛️ MKT_MP_NOTIFICATION_URL not set. The gateway will only notify the account-level webhook.");
        }
        let timeout_ms = std::env::var("MKT_MP_TIMEOUT_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid MKT_MP_TIMEOUT_MS value '{s}'. {e}. Using the default."))
                    .ok()
            })
            .unwrap_or(DEFAULT_MP_TIMEOUT_MS);
        Self { access_token, base_url, notification_url, timeout: Duration::from_millis(timeout_ms) }
    }

    pub fn is_configured(&self) -> bool {
        !self.access_token.reveal().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MelhorEnvioConfig {
    pub token: Secret<String>,
    pub sandbox: bool,
    pub origin_zipcode: String,
    pub user_agent: String,
}

impl MelhorEnvioConfig {
    pub fn new_from_env_or_default() -> Self {
        let token = Secret::new(std::env::var("MKT_ME_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ MKT_ME_TOKEN not set. Shipping quotes will fall back to the static table.");
            String::default()
        }));
        let sandbox = env_flag("MKT_ME_SANDBOX", false);
        let origin_zipcode = std::env::var("MKT_ME_ORIGIN_ZIPCODE").unwrap_or_else(|_| {
            info!("🪛️ MKT_ME_ORIGIN_ZIPCODE not set. Using {DEFAULT_ORIGIN_ZIPCODE}");
            DEFAULT_ORIGIN_ZIPCODE.to_string()
        });
        let user_agent = std::env::var("MKT_ME_USER_AGENT")
            .unwrap_or_else(|_| format!("marketplace-settlement/{}", env!("CARGO_PKG_VERSION")));
        Self { token, sandbox, origin_zipcode, user_agent }
    }

    pub fn base_url(&self) -> &'static str {
        if self.sandbox {
            ME_SANDBOX_URL
        } else {
            ME_PRODUCTION_URL
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.reveal().is_empty()
    }
}
