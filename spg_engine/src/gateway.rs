//! The payment provider as seen by the engine.
//!
//! [`PaymentGateway`] is the seam between the reconciliation engine and the provider's REST client. The engine never
//! sees the provider's wire format; it sees [`ProviderStatus`], a closed vocabulary, and maps it onto order statuses
//! with [`map_provider_status`].
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db_types::{Order, OrderNumber, OrderStatus, PaymentMethod};

//--------------------------------------    ProviderStatus     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderStatus {
    Unpaid,
    Pending,
    Paid,
    Settled,
    Expired,
    Failed,
    Refunded,
    /// Anything the provider sends that we have not seen before. Kept verbatim for the logs.
    Unknown(String),
}

impl FromStr for ProviderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => Self::Unpaid,
            "PENDING" => Self::Pending,
            "PAID" => Self::Paid,
            "SETTLED" => Self::Settled,
            "EXPIRED" => Self::Expired,
            "FAILED" => Self::Failed,
            "REFUND" | "REFUNDED" => Self::Refunded,
            _ => Self::Unknown(s.to_string()),
        };
        Ok(status)
    }
}

impl From<&str> for ProviderStatus {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(e) => match e {},
        }
    }
}

impl Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Unpaid => write!(f, "UNPAID"),
            ProviderStatus::Pending => write!(f, "PENDING"),
            ProviderStatus::Paid => write!(f, "PAID"),
            ProviderStatus::Settled => write!(f, "SETTLED"),
            ProviderStatus::Expired => write!(f, "EXPIRED"),
            ProviderStatus::Failed => write!(f, "FAILED"),
            ProviderStatus::Refunded => write!(f, "REFUNDED"),
            ProviderStatus::Unknown(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMapping {
    Mapped(OrderStatus),
    /// There is no safe interpretation of this provider status. Log it and try again later.
    Unmapped,
}

/// The provider-to-order status lookup table.
///
/// Refunds are deliberately unmapped: a refund after fulfilment has started is an operator decision, not something
/// reconciliation should guess at.
pub fn map_provider_status(status: &ProviderStatus) -> StatusMapping {
    match status {
        ProviderStatus::Unpaid | ProviderStatus::Pending => StatusMapping::Mapped(OrderStatus::Pending),
        ProviderStatus::Paid | ProviderStatus::Settled => StatusMapping::Mapped(OrderStatus::Paid),
        ProviderStatus::Expired => StatusMapping::Mapped(OrderStatus::Cancelled),
        ProviderStatus::Failed => StatusMapping::Mapped(OrderStatus::Failed),
        ProviderStatus::Refunded | ProviderStatus::Unknown(_) => StatusMapping::Unmapped,
    }
}

//--------------------------------------    Gateway objects    ---------------------------------------------------------
/// The provider's view of a single transaction, from either a status query or a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStatus {
    pub reference: String,
    pub order_number: OrderNumber,
    pub status: ProviderStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// What the customer needs to complete a payment: a pay code (virtual account number, retail code) and/or a checkout
/// url (e-wallets, cards).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInstructions {
    pub reference: String,
    pub method: PaymentMethod,
    pub status: ProviderStatus,
    pub pay_code: Option<String>,
    pub checkout_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or a 5xx from the provider. Safe to retry later.
    #[error("Payment provider is unavailable: {0}")]
    Unavailable(String),
    /// The provider rejected our credentials or signature. Retrying will not help.
    #[error("Payment provider rejected our credentials: {0}")]
    Authentication(String),
    #[error("The provider already has an active transaction for this order: {0}")]
    DuplicateInvoice(String),
    #[error("The provider has no transaction matching {0}")]
    TransactionNotFound(String),
    #[error("The provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not interpret the provider response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// Outbound adapter to the payment provider.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Opens a new transaction at the provider for the full amount due on `order`.
    ///
    /// Must return [`GatewayError::DuplicateInvoice`] when the provider reports that a transaction for this order is
    /// still active.
    async fn create_transaction(
        &self,
        order: &Order,
        method: PaymentMethod,
        customer_email: &str,
    ) -> Result<TransactionInstructions, GatewayError>;

    /// Queries the current state of the transaction with the given provider reference.
    async fn query_status(&self, reference: &str) -> Result<TransactionStatus, GatewayError>;

    /// Queries the most recent transaction the provider holds for `order_number`.
    async fn query_status_for_order(&self, order_number: &OrderNumber) -> Result<TransactionStatus, GatewayError>;

    /// Checks the webhook signature over the raw request body.
    fn verify_callback(&self, body: &[u8], signature: &str) -> bool;

    /// Parses a (verified) webhook body.
    fn parse_callback(&self, body: &[u8]) -> Result<TransactionStatus, GatewayError>;
}
