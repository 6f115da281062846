use std::{env, str::FromStr};

use chrono::Duration;
use gateway_tools::{MelhorEnvioConfig, MercadoPagoConfig};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use settle_common::{env_flag, BasisPoints, Cents, Secret};
use settlement_engine::{CommissionPolicy, DEFAULT_MIN_WITHDRAWAL, DEFAULT_SHIPPING_PRICE};

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.db";
const DEFAULT_JWT_ISSUER: &str = "marketplace-auth";
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_COMPLETION_HOLD_PERIOD: Duration = Duration::hours(168);
const DEFAULT_TRACKING_SYNC_INTERVAL: Duration = Duration::minutes(30);
const DEFAULT_WEBHOOK_MAX_ATTEMPTS: i64 = 8;
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// Flat shipping price charged when the buyer did not pick a quoted option.
    pub default_shipping_price: Cents,
    pub commission: CommissionPolicy,
    pub min_withdrawal: Cents,
    /// When false, unpaid orders are never expired and their products stay reserved.
    pub expire_unpaid_orders: bool,
    pub unpaid_order_timeout: Duration,
    /// How long a delivered order is held before the funds are released automatically.
    pub completion_hold_period: Duration,
    pub webhook_max_attempts: i64,
    pub tracking_sync_interval: Duration,
    pub mercadopago: MercadoPagoConfig,
    pub melhorenvio: MelhorEnvioConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            default_shipping_price: DEFAULT_SHIPPING_PRICE,
            commission: CommissionPolicy::default(),
            min_withdrawal: DEFAULT_MIN_WITHDRAWAL,
            expire_unpaid_orders: true,
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            completion_hold_period: DEFAULT_COMPLETION_HOLD_PERIOD,
            webhook_max_attempts: DEFAULT_WEBHOOK_MAX_ATTEMPTS,
            tracking_sync_interval: DEFAULT_TRACKING_SYNC_INTERVAL,
            mercadopago: MercadoPagoConfig::default(),
            melhorenvio: MelhorEnvioConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = env_flag("MKT_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("MKT_USE_FORWARDED", false);
        let default_shipping_price = env_value("MKT_DEFAULT_SHIPPING_PRICE", DEFAULT_SHIPPING_PRICE);
        let commission = configure_commission_policy();
        let min_withdrawal = env_value("MKT_MIN_WITHDRAWAL", DEFAULT_MIN_WITHDRAWAL);
        let expire_unpaid_orders = env_flag("MKT_EXPIRE_UNPAID_ORDERS", true);
        if !expire_unpaid_orders {
            warn!("🪛️ Unpaid orders will never expire. Their products stay reserved until the buyer pays or cancels.");
        }
        let unpaid_order_timeout =
            env_duration("MKT_UNPAID_ORDER_TIMEOUT", DEFAULT_UNPAID_ORDER_TIMEOUT, TimeUnit::Hours);
        let completion_hold_period =
            env_duration("MKT_COMPLETION_HOLD_PERIOD", DEFAULT_COMPLETION_HOLD_PERIOD, TimeUnit::Hours);
        let tracking_sync_interval =
            env_duration("MKT_TRACKING_SYNC_INTERVAL", DEFAULT_TRACKING_SYNC_INTERVAL, TimeUnit::Minutes);
        let webhook_max_attempts = env_value("MKT_WEBHOOK_MAX_ATTEMPTS", DEFAULT_WEBHOOK_MAX_ATTEMPTS).max(1);
        let mercadopago = MercadoPagoConfig::new_from_env_or_default();
        if !mercadopago.is_configured() {
            warn!("🪛️ MKT_MP_ACCESS_TOKEN is not set. Checkout requests will fail until it is.");
        }
        let melhorenvio = MelhorEnvioConfig::new_from_env_or_default();
        if !melhorenvio.is_configured() {
            info!("🪛️ MKT_ME_TOKEN is not set. Shipping quotes will use the fallback table.");
        }
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            default_shipping_price,
            commission,
            min_withdrawal,
            expire_unpaid_orders,
            unpaid_order_timeout,
            completion_hold_period,
            webhook_max_attempts,
            tracking_sync_interval,
            mercadopago,
            melhorenvio,
        }
    }
}

fn configure_commission_policy() -> CommissionPolicy {
    let defaults = CommissionPolicy::default();
    CommissionPolicy {
        free_commission: env_bps("MKT_COMMISSION_FREE_BPS", defaults.free_commission),
        premium_commission: env_bps("MKT_COMMISSION_PREMIUM_BPS", defaults.premium_commission),
        promo_commission: env_bps("MKT_COMMISSION_PROMO_BPS", defaults.promo_commission),
        free_cashback: env_bps("MKT_CASHBACK_FREE_BPS", defaults.free_cashback),
        premium_cashback: env_bps("MKT_CASHBACK_PREMIUM_BPS", defaults.premium_cashback),
    }
}

fn env_bps(name: &str, default: BasisPoints) -> BasisPoints {
    let bps = env_value(name, default.value());
    if (0..10_000).contains(&bps) {
        BasisPoints::from(bps)
    } else {
        warn!("🪛️ {name} must be between 0 and 9999 basis points. Using the default of {default}.");
        default
    }
}

/// Reads and parses `name`, falling back to `default` (with a log entry) when it is missing or invalid.
fn env_value<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .map_err(|_| debug!("🪛️ {name} is not set. Using the default value of {default}."))
        .and_then(|s| s.trim().parse::<T>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}")))
        .ok()
        .unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
enum TimeUnit {
    Minutes,
    Hours,
}

impl TimeUnit {
    fn duration(self, n: i64) -> Duration {
        match self {
            Self::Minutes => Duration::minutes(n),
            Self::Hours => Duration::hours(n),
        }
    }

    fn describe(self, d: Duration) -> String {
        match self {
            Self::Minutes => format!("{} mins", d.num_minutes()),
            Self::Hours => format!("{} hrs", d.num_hours()),
        }
    }
}

fn env_duration(name: &str, default: Duration, unit: TimeUnit) -> Duration {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {}.", unit.describe(default)))
        .and_then(|s| s.trim().parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}")))
        .and_then(|v| {
            if v > 0 {
                Ok(unit.duration(v))
            } else {
                warn!("🪛️ {name} must be positive. Using the default value of {}.", unit.describe(default));
                Err(())
            }
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Access tokens are issued by the marketplace's auth service and signed with a shared HS256 secret.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    /// Tokens with any other `iss` claim are rejected.
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued by the \
             auth service will be accepted. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), issuer: DEFAULT_JWT_ISSUER.to_string() }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S, issuer: &str) -> Self {
        Self { jwt_secret: Secret::new(secret.into()), issuer: issuer.to_string() }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MKT_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MKT_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "MKT_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        let issuer = env::var("MKT_JWT_ISSUER").ok().unwrap_or_else(|| {
            info!("🪛️ MKT_JWT_ISSUER is not set. Expecting tokens from {DEFAULT_JWT_ISSUER}");
            DEFAULT_JWT_ISSUER.to_string()
        });
        Ok(Self { jwt_secret: Secret::new(secret), issuer })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that handlers may read. Secrets stay out of it.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.port, 9000);
        assert_eq!(config.default_shipping_price, Cents::from(1_500));
        assert_eq!(config.min_withdrawal, Cents::from(1_000));
        assert_eq!(config.commission.free_commission, BasisPoints::from(2_000));
        assert_eq!(config.unpaid_order_timeout, Duration::hours(48));
        assert_eq!(config.completion_hold_period, Duration::days(7));
        assert!(config.expire_unpaid_orders);
    }

    #[test]
    fn random_secret_is_long_enough() {
        let auth = AuthConfig::default();
        assert_eq!(auth.jwt_secret.reveal().len(), 64);
        assert_eq!(auth.issuer, "marketplace-auth");
    }

    #[test]
    fn short_secrets_are_rejected() {
        env::set_var("MKT_JWT_SECRET", "too-short");
        let result = AuthConfig::try_from_env();
        env::remove_var("MKT_JWT_SECRET");
        assert!(matches!(result, Err(ServerError::ConfigurationError(_))));
    }
}
