//! # Backend contracts
//!
//! The traits in this module define what a storage backend must provide for the payment engine to run on it.
//!
//! * [`OrderStore`] holds orders, their status history and their payment attempts. It is the only shared mutable
//!   resource in the system, and its [`OrderStore::compare_and_set_status`] is the only way an order's status changes.
//! * [`NotificationStore`] is an append-only log of user notifications (plus a read marker).
//! * [`AccountDirectory`] looks up the accounts behind authenticated identities. Account management itself happens
//!   elsewhere.
mod account_directory;
mod notification_store;
mod order_store;

pub use account_directory::{AccountDirectory, AccountDirectoryError};
pub use notification_store::{NotificationStore, NotificationStoreError};
pub use order_store::{OrderStore, OrderStoreError};
