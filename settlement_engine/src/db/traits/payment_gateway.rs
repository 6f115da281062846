use thiserror::Error;

use crate::payment_objects::{GatewayPayment, PaymentHandle, PaymentRequest};

/// Failures talking to an external collaborator.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The gateway did not answer in time. {0}")]
    Timeout(String),
    #[error("Could not reach the gateway. {0}")]
    Transport(String),
    #[error("The gateway refused the request. {0}")]
    Refused(String),
    #[error("Unexpected gateway response. {0}")]
    InvalidResponse(String),
    #[error("The gateway is not configured. {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

/// The external payment gateway.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a payment. Implementations call the gateway exactly once and never retry internally.
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, GatewayError>;

    /// Fetches the authoritative state of a payment.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
