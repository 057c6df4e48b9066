//! [`ProviderGateway`] plugs the provider's REST client into the engine's [`PaymentGateway`] seam.
use chrono::{Duration, Utc};
use gateway_tools::{
    helpers::verify_callback_signature,
    CallbackPayload,
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
    TransactionData,
};
use log::*;
use spg_common::Secret;
use spg_engine::{
    db_types::{Order, OrderNumber, PaymentMethod},
    gateway::{ProviderStatus, TransactionInstructions, TransactionStatus},
    GatewayError,
    PaymentGateway,
};

#[derive(Clone)]
pub struct ProviderGateway {
    api: GatewayApi,
    webhook_secret: Secret<String>,
    /// How long the provider should keep a new transaction open
    payment_expiry: Duration,
}

impl ProviderGateway {
    pub fn new(
        config: GatewayConfig,
        webhook_secret: Secret<String>,
        payment_expiry: Duration,
    ) -> Result<Self, GatewayApiError> {
        let api = GatewayApi::new(config)?;
        Ok(Self { api, webhook_secret, payment_expiry })
    }
}

impl PaymentGateway for ProviderGateway {
    async fn create_transaction(
        &self,
        order: &Order,
        method: PaymentMethod,
        customer_email: &str,
    ) -> Result<TransactionInstructions, GatewayError> {
        let expires_at = Utc::now() + self.payment_expiry;
        let amount = order.amount_due().to_decimal_string();
        let data = self
            .api
            .create_transaction(
                method.channel_code(),
                order.order_number.as_str(),
                &amount,
                customer_email,
                expires_at.timestamp(),
            )
            .await
            .map_err(to_gateway_error)?;
        let method = data.payment_method.as_deref().and_then(PaymentMethod::from_channel_code).unwrap_or(method);
        Ok(TransactionInstructions {
            status: ProviderStatus::from(data.status.as_str()),
            reference: data.reference,
            method,
            pay_code: data.pay_code,
            checkout_url: data.checkout_url,
            expires_at: data.expired_time.or(Some(expires_at)),
        })
    }

    async fn query_status(&self, reference: &str) -> Result<TransactionStatus, GatewayError> {
        let data = self.api.transaction_detail(reference).await.map_err(to_gateway_error)?;
        Ok(to_transaction_status(data))
    }

    async fn query_status_for_order(&self, order_number: &OrderNumber) -> Result<TransactionStatus, GatewayError> {
        let data = self.api.transaction_detail_by_merchant_ref(order_number.as_str()).await.map_err(to_gateway_error)?;
        Ok(to_transaction_status(data))
    }

    fn verify_callback(&self, body: &[u8], signature: &str) -> bool {
        if self.webhook_secret.is_empty() {
            warn!("🪝️ No webhook secret is configured, so the callback cannot be verified");
            return false;
        }
        verify_callback_signature(self.webhook_secret.reveal(), body, signature)
    }

    fn parse_callback(&self, body: &[u8]) -> Result<TransactionStatus, GatewayError> {
        let payload = serde_json::from_slice::<CallbackPayload>(body)
            .map_err(|e| GatewayError::InvalidResponse(format!("Invalid callback payload. {e}")))?;
        if payload.merchant_ref.is_empty() {
            return Err(GatewayError::InvalidResponse("Callback has no merchant reference".into()));
        }
        Ok(TransactionStatus {
            status: ProviderStatus::from(payload.status.as_str()),
            order_number: OrderNumber::from(payload.merchant_ref),
            reference: payload.reference,
            paid_at: payload.paid_at,
        })
    }
}

fn to_transaction_status(data: TransactionData) -> TransactionStatus {
    TransactionStatus {
        status: ProviderStatus::from(data.status.as_str()),
        order_number: OrderNumber::from(data.merchant_ref),
        reference: data.reference,
        paid_at: data.paid_at,
    }
}

fn to_gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::RequestFailed(s) | GatewayApiError::Timeout(s) | GatewayApiError::Initialization(s) => {
            GatewayError::Unavailable(s)
        },
        GatewayApiError::Unauthorized { status, message } => {
            GatewayError::Authentication(format!("Error {status}. {message}"))
        },
        GatewayApiError::DuplicateInvoice(s) => GatewayError::DuplicateInvoice(s),
        GatewayApiError::QueryError { status: 404, message } => GatewayError::TransactionNotFound(message),
        e @ GatewayApiError::QueryError { .. } if e.is_transient() => GatewayError::Unavailable(e.to_string()),
        GatewayApiError::QueryError { status, message } => GatewayError::Rejected(format!("Error {status}. {message}")),
        GatewayApiError::Rejected(s) => GatewayError::Rejected(s),
        GatewayApiError::JsonError(s) => GatewayError::InvalidResponse(s),
    }
}
