use chrono::Duration;
use thiserror::Error;

use crate::db_types::{
    NewOrder,
    NewPaymentAttempt,
    Order,
    OrderNumber,
    OrderStatus,
    PaymentAttempt,
    StatusChange,
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderNumber),
    #[error("Payment attempt {0} already exists")]
    AttemptAlreadyExists(String),
    #[error("Order {0} not found")]
    OrderNotFound(OrderNumber),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// Storage for orders and everything hanging off them.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// Stores a brand-new order in `PENDING`.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    /// A fresh read of the order. Never cached.
    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, OrderStoreError>;

    async fn get_status(&self, order_number: &OrderNumber) -> Result<Option<OrderStatus>, OrderStoreError>;

    /// Sets the order's status to `new_status` if, and only if, it is currently `expected`. `updated_at` is bumped and
    /// a status history row (tagged with `source`) is written in the same atomic step.
    ///
    /// Returns `false`, changing nothing, if the order's status was not `expected` (someone else got there first).
    async fn compare_and_set_status(
        &self,
        order_number: &OrderNumber,
        expected: OrderStatus,
        new_status: OrderStatus,
        source: &str,
    ) -> Result<bool, OrderStoreError>;

    /// All orders still in `PENDING` that were created more than `age` ago, oldest first.
    async fn fetch_pending_orders_older_than(&self, age: Duration) -> Result<Vec<Order>, OrderStoreError>;

    /// Every accepted transition for the order, in the order they were applied.
    async fn fetch_status_history(&self, order_number: &OrderNumber) -> Result<Vec<StatusChange>, OrderStoreError>;

    async fn insert_payment_attempt(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, OrderStoreError>;

    /// Payment attempts for the order, oldest first.
    async fn fetch_payment_attempts(&self, order_number: &OrderNumber)
        -> Result<Vec<PaymentAttempt>, OrderStoreError>;

    /// Records the raw provider status last seen for the attempt with the given provider reference. Unknown references
    /// are ignored.
    async fn update_attempt_status(&self, reference: &str, gateway_status: &str) -> Result<(), OrderStoreError>;
}
