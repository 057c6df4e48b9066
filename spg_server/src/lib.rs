//! # SPG server
//! This crate hosts the HTTP server for the shop payment gateway. It is responsible for:
//! * Receiving payment callbacks (webhooks) from the payment provider and handing them to the reconciliation engine.
//! * Letting authenticated users open payments, check on them and read their notifications.
//! * Letting admins move orders along the fulfilment path.
//! * Running the scheduled poll that reconciles orders the provider never told us about.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The provider's callback route. Signed with HMAC-SHA256 over the raw body.
//! * `/api/...`: Routes that require a bearer token. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod poll_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
