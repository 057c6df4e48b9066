use std::fmt::Display;

use serde::{Deserialize, Serialize};
use spg_engine::{
    db_types::{Order, OrderNumber, OrderStatus},
    PaymentOutcome,
    ReconcileOutcome,
};

/// What a user (or admin) sees after asking for an order's status to be brought up to date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCheckResponse {
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub updated: bool,
    pub message: String,
}

impl StatusCheckResponse {
    pub fn from_outcome(outcome: &ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Updated { order, to, .. } => Self {
                order_number: order.order_number.clone(),
                status: *to,
                updated: true,
                message: format!("Updated to {to}"),
            },
            ReconcileOutcome::Unchanged { order } | ReconcileOutcome::RaceLost { order } => Self::unchanged(order),
        }
    }

    pub fn unchanged(order: &Order) -> Self {
        let message = match order.status {
            OrderStatus::Pending => "Still pending, try again later".to_string(),
            status => format!("Order is {status}"),
        };
        Self { order_number: order.order_number.clone(), status: order.status, updated: false, message }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRequest {
    /// A payment method name or provider channel code, e.g. "QRIS" or "BRIVA"
    pub method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: PaymentOutcome,
}

impl From<PaymentOutcome> for PaymentResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        let message = match &outcome {
            PaymentOutcome::PaymentCreated { instructions, .. } => {
                format!("Payment {} created. Complete it before it expires.", instructions.reference)
            },
            PaymentOutcome::AlreadyPaid { .. } => "This order has already been paid".to_string(),
            PaymentOutcome::AttemptStillActive { .. } => {
                "Invoice already in use. Complete the open payment, or try again once it has expired".to_string()
            },
        };
        Self { message, outcome }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// The body we return to the payment provider for every callback we accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

impl WebhookAck {
    pub fn new<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}
