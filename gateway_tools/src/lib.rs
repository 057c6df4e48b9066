//! Client for the payment provider's REST API.
//!
//! This crate knows the provider's wire format and nothing else. Mapping provider statuses onto order statuses is the
//! payment engine's job.
mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{CallbackPayload, CreateTransactionRequest, GatewayResponse, TransactionData};
pub use error::GatewayApiError;
