use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use campus_eats_engine::MarketplaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Webhook signature missing or invalid")]
    InvalidWebhookSignature,
    #[error("{0}")]
    Market(#[from] MarketplaceError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) | Self::BackendError(_) | Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
            },
            Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::Market(e) => market_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "success": false, "error": self.to_string() }).to_string())
    }
}

/// Maps the engine's error taxonomy onto HTTP statuses: absent records are 404, authorization
/// failures 403, malformed input 400, business-rule rejections 409, a declined gateway 402, and
/// an unreachable gateway 503 (retryable).
fn market_status_code(e: &MarketplaceError) -> StatusCode {
    use MarketplaceError::*;
    match e {
        LoungeNotFound(_) | FoodNotFound(_) | OrderNotFound(_) | PaymentNotFound(_)
        | PaymentReferenceNotFound(_) | ContractNotFound => StatusCode::NOT_FOUND,
        NotAuthorized(_) => StatusCode::FORBIDDEN,
        InvalidPaymentMethod(_) | InvalidAmount(_) | InvalidQrToken | InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FoodUnavailable { .. } | InsufficientBalance { .. } | AlreadyDelivered(_) | ContractAlreadyActive(_)
        | ForbiddenTransition { .. } | PaymentAlreadyCompleted(_) => StatusCode::CONFLICT,
        GatewayRejected(_) => StatusCode::PAYMENT_REQUIRED,
        GatewayUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DatabaseError(_) | QrGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
}
