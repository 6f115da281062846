pub mod melhorenvio;
pub mod mercadopago;
pub mod notifications;

use gateway_tools::GatewayApiError;
use settlement_engine::GatewayError;

/// Translates a provider client failure into the engine's view of it. Only timeouts and transport problems are
/// worth retrying.
pub(crate) fn gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::Timeout(s) => GatewayError::Timeout(s),
        e if e.is_transient() => GatewayError::Transport(e.to_string()),
        GatewayApiError::QueryError { status, message } if (400..500).contains(&status) => {
            GatewayError::Refused(format!("Error {status}. {message}"))
        },
        GatewayApiError::NotConfigured(s) | GatewayApiError::Initialization(s) => GatewayError::NotConfigured(s),
        e => GatewayError::InvalidResponse(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_mapping() {
        assert!(matches!(gateway_error(GatewayApiError::Timeout("t".into())), GatewayError::Timeout(_)));
        let busy = GatewayApiError::QueryError { status: 503, message: "busy".into() };
        assert!(gateway_error(busy).is_retryable());
        let throttled = GatewayApiError::QueryError { status: 429, message: "slow down".into() };
        assert!(gateway_error(throttled).is_retryable());
        let bad = GatewayApiError::QueryError { status: 400, message: "invalid card token".into() };
        assert!(matches!(gateway_error(bad), GatewayError::Refused(m) if m.contains("invalid card token")));
        assert!(matches!(gateway_error(GatewayApiError::JsonError("eof".into())), GatewayError::InvalidResponse(_)));
        assert!(matches!(gateway_error(GatewayApiError::NotConfigured("x".into())), GatewayError::NotConfigured(_)));
    }
}
