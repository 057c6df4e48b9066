use std::time::Duration;

use log::*;
use spg_common::Secret;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// The base url of the provider API, e.g. "https://gateway.example.com/api"
    pub base_url: String,
    /// The merchant identifier assigned by the provider
    pub merchant_code: String,
    pub api_key: Secret<String>,
    /// The private key used to sign transaction requests and to verify callbacks
    pub private_key: Secret<String>,
    /// Upper bound on every request made to the provider
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SPG_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            warn!("SPG_GATEWAY_BASE_URL not set, using the (probably useless) sandbox default");
            "https://sandbox.gateway.example.com/api".to_string()
        });
        let merchant_code = std::env::var("SPG_GATEWAY_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("SPG_GATEWAY_MERCHANT_ID not set, using (probably useless) default");
            "T0000".to_string()
        });
        let api_key = Secret::new(std::env::var("SPG_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("SPG_GATEWAY_API_KEY not set. Calls to the payment provider will be rejected.");
            String::default()
        }));
        let private_key = Secret::new(std::env::var("SPG_GATEWAY_PRIVATE_KEY").unwrap_or_else(|_| {
            warn!("SPG_GATEWAY_PRIVATE_KEY not set. Calls to the payment provider will be rejected.");
            String::default()
        }));
        let timeout = std::env::var("SPG_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid value for SPG_GATEWAY_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT);
        Self { base_url, merchant_code, api_key, private_key, timeout }
    }
}
