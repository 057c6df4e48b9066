//! Shop Payment Gateway Engine
//!
//! This library keeps a shop's orders consistent with the payment provider's view of their transactions. It is
//! provider-agnostic: the provider is reached through the [`PaymentGateway`] trait, and storage through the backend
//! traits in [`mod@traits`].
//!
//! The library is divided into these main sections:
//! 1. Data types ([`mod@db_types`]) and the order status state machine ([`mod@state_machine`]).
//! 2. Storage. Backends implement [`OrderStore`], [`NotificationStore`] and [`AccountDirectory`]. SQLite is the
//!    supported backend ([`SqliteDatabase`]).
//! 3. The public API ([`mod@api`]). [`ReconciliationApi`] funnels webhooks, manual status checks, the scheduled poll,
//!    payment creation and admin overrides through one per-order critical section. [`NotificationDispatcher`] turns
//!    the transitions it applies into user notifications.
//!
//! The engine also emits events that can be subscribed to. When a notification is created, a `NotificationEvent` is
//! published to every `on_notification_created` hook; the server uses this to push notifications in real time.
pub mod api;
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod order_locks;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    errors::{NotificationApiError, ReconciliationError},
    notification_api::NotificationDispatcher,
    reconcile_objects::{PaymentOutcome, PollSummary, ReconcileOutcome, ReconciliationOptions, Trigger},
    reconciliation_api::ReconciliationApi,
};
pub use gateway::{GatewayError, PaymentGateway};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AccountDirectory, NotificationStore, OrderStore};
