use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The envelope that wraps every response from the provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTransactionRequest {
    /// The provider's channel code for the payment instrument, e.g. "BRIVA" or "QRIS"
    pub method: String,
    /// Our order number. The provider only allows one active transaction per merchant reference.
    pub merchant_ref: String,
    /// Decimal string, e.g. "150000.00"
    pub amount: String,
    pub customer_email: String,
    /// Unix timestamp after which the provider will expire the transaction
    pub expired_time: i64,
    pub signature: String,
}

/// A transaction record, as returned by both the create and detail endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionData {
    pub reference: String,
    pub merchant_ref: String,
    /// Raw provider status, e.g. "UNPAID" or "PAID"
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub pay_code: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expired_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// The body the provider posts to our callback (webhook) url when a transaction changes state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackPayload {
    pub reference: String,
    pub merchant_ref: String,
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub total_amount: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub paid_at: Option<DateTime<Utc>>,
}
