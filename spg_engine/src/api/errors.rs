use thiserror::Error;

use crate::{
    db_types::{OrderNumber, OrderStatus},
    gateway::GatewayError,
    traits::{NotificationStoreError, OrderStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Insufficient permissions for this operation")]
    Forbidden,
    #[error("Cannot move an order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("Payment provider unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Payment provider rejected our credentials: {0}")]
    GatewayAuthentication(String),
    #[error("Payment provider rejected the request: {0}")]
    GatewayRejected(String),
    /// The provider answered, but not in a form we understand. Retrying the same call will not help.
    #[error("Payment provider sent a response we could not read: {0}")]
    GatewayInvalidResponse(String),
    #[error("Webhook signature is invalid")]
    GatewaySignatureInvalid,
    #[error("Webhook payload could not be read: {0}")]
    InvalidWebhookPayload(String),
    #[error("Provider status {0} has no mapping to an order status")]
    UnmappedProviderStatus(String),
    #[error("No payment attempt exists for order {0}")]
    NoPaymentAttempt(OrderNumber),
    #[error("Order {0} has used up its {1} payment attempts")]
    PaymentAttemptsExhausted(OrderNumber, u32),
    #[error("Order is {0} and cannot be paid for")]
    OrderNotPayable(OrderStatus),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ReconciliationError {
    /// Transient errors leave the order untouched and can be retried on the next poll tick or by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReconciliationError::GatewayUnavailable(_)
                | ReconciliationError::UnmappedProviderStatus(_)
                | ReconciliationError::DatabaseError(_)
        )
    }
}

impl From<OrderStoreError> for ReconciliationError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(n) => ReconciliationError::OrderNotFound(n),
            e => ReconciliationError::DatabaseError(e.to_string()),
        }
    }
}

impl From<NotificationStoreError> for ReconciliationError {
    fn from(e: NotificationStoreError) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}

impl From<GatewayError> for ReconciliationError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(s) => ReconciliationError::GatewayUnavailable(s),
            GatewayError::Authentication(s) => ReconciliationError::GatewayAuthentication(s),
            GatewayError::InvalidResponse(s) => ReconciliationError::GatewayInvalidResponse(s),
            GatewayError::DuplicateInvoice(s) | GatewayError::Rejected(s) | GatewayError::TransactionNotFound(s) => {
                ReconciliationError::GatewayRejected(s)
            },
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum NotificationApiError {
    #[error("Notification {0} not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<NotificationStoreError> for NotificationApiError {
    fn from(e: NotificationStoreError) -> Self {
        NotificationApiError::DatabaseError(e.to_string())
    }
}
