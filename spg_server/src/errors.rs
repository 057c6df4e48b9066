use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use spg_engine::{NotificationApiError, ReconciliationError};
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
    #[error("Unable to update order")]
    UnableToUpdateOrder,
    #[error("{0}")]
    Conflict(String),
    #[error("The payment provider is unavailable. Please try again later.")]
    GatewayUnavailable,
    #[error("The payment provider could not handle the request. {0}")]
    GatewayError(String),
    #[error("Invalid callback signature")]
    InvalidSignature,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => e.status_code(),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::UnableToUpdateOrder => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
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
    #[error("No access token was provided.")]
    MissingCredential,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Could not look up the account. {0}")]
    DirectoryError(String),
}

impl AuthError {
    /// Failing to prove who you are is 401. Proving who you are, but not being allowed, is 403.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential => StatusCode::UNAUTHORIZED,
            AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
            AuthError::AccountNotFound => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AuthError::DirectoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(n) => Self::NoRecordFound(format!("Order {n} does not exist")),
            ReconciliationError::Forbidden => {
                Self::InsufficientPermissions("You are not allowed to act on this order".into())
            },
            // Users don't need to know about the state machine
            ReconciliationError::IllegalTransition { .. } => Self::UnableToUpdateOrder,
            ReconciliationError::GatewayUnavailable(_) => Self::GatewayUnavailable,
            ReconciliationError::UnmappedProviderStatus(_) => Self::GatewayUnavailable,
            ReconciliationError::GatewayAuthentication(e) => {
                error!("🔐️ The payment provider rejected our credentials: {e}");
                Self::GatewayError("The payment provider is misconfigured".into())
            },
            ReconciliationError::GatewayRejected(msg) => Self::GatewayError(msg),
            ReconciliationError::GatewayInvalidResponse(e) => {
                error!("🔄️ Could not read the payment provider's response: {e}");
                Self::GatewayError("The payment provider sent an unexpected response".into())
            },
            ReconciliationError::GatewaySignatureInvalid => Self::InvalidSignature,
            ReconciliationError::InvalidWebhookPayload(msg) => Self::InvalidRequestBody(msg),
            ReconciliationError::NoPaymentAttempt(n) => {
                Self::NoRecordFound(format!("No payment has been started for order {n}"))
            },
            e @ ReconciliationError::PaymentAttemptsExhausted(..) => Self::Conflict(e.to_string()),
            e @ ReconciliationError::OrderNotPayable(_) => Self::Conflict(e.to_string()),
            ReconciliationError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<NotificationApiError> for ServerError {
    fn from(e: NotificationApiError) -> Self {
        match e {
            NotificationApiError::NotFound(id) => Self::NoRecordFound(format!("Notification {id} does not exist")),
            NotificationApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
