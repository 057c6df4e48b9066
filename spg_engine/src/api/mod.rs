//! # Payment engine public API
//!
//! * [`reconciliation_api`] is the single authority for order status changes. Webhooks, manual status checks, the
//!   scheduled poll, payment creation and admin overrides all go through it.
//! * [`notification_api`] turns accepted transitions into user notifications, and lets users read them.
//!
//! As with the rest of the engine, an API instance is created by supplying a backend that implements the traits it
//! needs:
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url(&url, 25).await?;
//! let notifications = NotificationDispatcher::new(db.clone(), producers);
//! let api = ReconciliationApi::new(db, gateway, notifications, ReconciliationOptions::default());
//! let outcome = api.check_status(&identity, &order_number).await?;
//! ```
pub mod errors;
pub mod notification_api;
pub mod reconcile_objects;
pub mod reconciliation_api;
