use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request to the payment provider failed: {0}")]
    RequestFailed(String),
    #[error("Request to the payment provider timed out: {0}")]
    Timeout(String),
    #[error("The payment provider rejected our credentials. Error {status}. {message}")]
    Unauthorized { status: u16, message: String },
    #[error("An invoice for this order is already in use. {0}")]
    DuplicateInvoice(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The payment provider declined the request: {0}")]
    Rejected(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl GatewayApiError {
    /// Transient failures can be retried on the next poll tick. Everything else needs a human, or a different request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::Timeout(_) => true,
            Self::QueryError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}
