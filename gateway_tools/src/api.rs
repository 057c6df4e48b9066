use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{CreateTransactionRequest, GatewayResponse, TransactionData},
    helpers::{classify_failure, transaction_signature},
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let envelope = serde_json::from_str::<GatewayResponse<T>>(&text);
        match envelope {
            Ok(GatewayResponse { success: true, data: Some(data), .. }) if status.is_success() => {
                trace!("REST query successful. {status}");
                Ok(data)
            },
            Ok(GatewayResponse { message, .. }) => {
                debug!("Payment provider returned {status}: {message}");
                Err(classify_failure(status.as_u16(), &message))
            },
            Err(e) if status.is_success() => Err(GatewayApiError::JsonError(e.to_string())),
            Err(_) => Err(classify_failure(status.as_u16(), &text)),
        }
    }

    /// Opens a new transaction for `merchant_ref`. The request is signed with the merchant's private key.
    ///
    /// Returns [`GatewayApiError::DuplicateInvoice`] if the provider still has an active transaction for this
    /// merchant reference.
    pub async fn create_transaction(
        &self,
        method: &str,
        merchant_ref: &str,
        amount: &str,
        customer_email: &str,
        expired_time: i64,
    ) -> Result<TransactionData, GatewayApiError> {
        let signature = transaction_signature(
            self.config.private_key.reveal(),
            &self.config.merchant_code,
            merchant_ref,
            amount,
        );
        let request = CreateTransactionRequest {
            method: method.to_string(),
            merchant_ref: merchant_ref.to_string(),
            amount: amount.to_string(),
            customer_email: customer_email.to_string(),
            expired_time,
            signature,
        };
        debug!("Creating {method} transaction for {merchant_ref}");
        let result = self.rest_query::<TransactionData, _>(Method::POST, "/transaction/create", &[], Some(request)).await?;
        info!("Transaction {} created for {merchant_ref}", result.reference);
        Ok(result)
    }

    /// Fetches the current state of the transaction with the given provider reference.
    pub async fn transaction_detail(&self, reference: &str) -> Result<TransactionData, GatewayApiError> {
        trace!("Fetching transaction {reference}");
        self.rest_query::<TransactionData, ()>(Method::GET, "/transaction/detail", &[("reference", reference)], None)
            .await
    }

    /// Fetches the most recent transaction opened for our `merchant_ref`. Used when we have lost track of the provider
    /// reference, e.g. after a duplicate-invoice response for an order with no recorded attempt.
    pub async fn transaction_detail_by_merchant_ref(&self, merchant_ref: &str) -> Result<TransactionData, GatewayApiError> {
        trace!("Fetching latest transaction for {merchant_ref}");
        self.rest_query::<TransactionData, ()>(
            Method::GET,
            "/transaction/detail",
            &[("merchant_ref", merchant_ref)],
            None,
        )
        .await
    }
}
