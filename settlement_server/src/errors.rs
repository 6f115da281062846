use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gateway_tools::GatewayApiError;
use settlement_engine::{CatalogError, GatewayError, LedgerError, OrderFlowError, WebhookQueueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Invalid query parameter. {0}")]
    InvalidQueryParameter(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    /// A business rule rejected the request. Nothing was changed.
    #[error("{0}")]
    Rejected(String),
    /// The order is not in a state that allows the request.
    #[error("{0}")]
    Conflict(String),
    /// An external collaborator failed in a way that may go away if the request is repeated.
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    BadGateway(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQueryParameter(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("The access token has expired.")]
    ExpiredToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            OrderFlowError::ProductUnavailable(_) |
            OrderFlowError::SelfPurchase |
            OrderFlowError::InvalidAddress(_) |
            OrderFlowError::InvalidShippingPrice(_) |
            OrderFlowError::MissingTrackingCode |
            OrderFlowError::CheckoutNotAllowed { .. } => Self::Rejected(e.to_string()),
            OrderFlowError::InvalidTransition { .. } |
            OrderFlowError::LabelAlreadyPurchased(_) |
            OrderFlowError::LabelNotAllowed { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::OrderNotFound(_) | OrderFlowError::PaymentNotLinked(_) | OrderFlowError::NoShippingLabel(_) => {
                Self::NoRecordFound(e.to_string())
            },
            OrderFlowError::NotOrderParticipant { .. } => Self::InsufficientPermissions(e.to_string()),
            OrderFlowError::OrderNumberCollision(_) | OrderFlowError::OrderNumberExhausted(_) => {
                Self::BackendError(e.to_string())
            },
            OrderFlowError::Catalog(e) => e.into(),
            OrderFlowError::Ledger(e) => e.into(),
            OrderFlowError::Gateway(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            LedgerError::InsufficientBalance { .. } |
            LedgerError::WithdrawalBelowMinimum { .. } |
            LedgerError::InvalidEntry(_) => Self::Rejected(e.to_string()),
            LedgerError::WithdrawalAlreadyResolved(_) => Self::Conflict(e.to_string()),
            LedgerError::WithdrawalNotFound(_) | LedgerError::UserNotFound(_) | LedgerError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            CatalogError::ProductNotFound(_) | CatalogError::UserNotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        if e.is_retryable() {
            return Self::ServiceUnavailable(format!("{e} Please try again later."));
        }
        match e {
            GatewayError::Refused(_) => Self::Rejected(e.to_string()),
            GatewayError::NotConfigured(_) => Self::ServiceUnavailable(e.to_string()),
            _ => Self::BadGateway(e.to_string()),
        }
    }
}

impl From<GatewayApiError> for ServerError {
    fn from(e: GatewayApiError) -> Self {
        Self::InitializeError(e.to_string())
    }
}

impl From<WebhookQueueError> for ServerError {
    fn from(e: WebhookQueueError) -> Self {
        Self::BackendError(e.to_string())
    }
}
