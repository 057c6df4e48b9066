//! Signature helpers for requests to, and callbacks from, the payment provider.
//!
//! The provider signs callbacks with HMAC-SHA256 over the raw request body, keyed with the merchant's private key, and
//! sends the hex-encoded digest in the `X-Callback-Signature` header. Transaction requests are signed the same way over
//! `merchant_code + merchant_ref + amount`.
use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

use crate::GatewayApiError;

type HmacSha256 = Hmac<Sha256>;

pub const CALLBACK_SIGNATURE_HEADER: &str = "X-Callback-Signature";

/// Calculates the hex-encoded HMAC-SHA256 signature of `data` using `secret`.
pub fn calculate_signature(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this can't fail
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// The request signature the provider expects when creating a transaction.
pub fn transaction_signature(private_key: &str, merchant_code: &str, merchant_ref: &str, amount: &str) -> String {
    let data = format!("{merchant_code}{merchant_ref}{amount}");
    calculate_signature(private_key, data.as_bytes())
}

/// Checks a callback signature in constant time. Malformed (non-hex) signatures are simply invalid.
pub fn verify_callback_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        trace!("Callback signature is not valid hex");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Turns a non-2xx (or `success: false`) provider response into the matching error kind.
///
/// The provider reports a second transaction for a merchant reference that still has an active one with a message
/// along the lines of "Merchant ref already in use", sometimes with a 409 and sometimes with a 400.
pub fn classify_failure(status: u16, message: &str) -> GatewayApiError {
    let lower = message.to_lowercase();
    if status == 409 || lower.contains("already in use") || lower.contains("already exists") {
        return GatewayApiError::DuplicateInvoice(message.to_string());
    }
    match status {
        401 | 403 => GatewayApiError::Unauthorized { status, message: message.to_string() },
        200..=299 => GatewayApiError::Rejected(message.to_string()),
        _ => GatewayApiError::QueryError { status, message: message.to_string() },
    }
}
