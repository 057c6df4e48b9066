//! `SqliteDatabase` is a concrete implementation of a payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{accounts, attempts, db_url, new_pool, notifications, orders};
use crate::{
    db_types::{
        Account,
        NewNotification,
        NewOrder,
        NewPaymentAttempt,
        Notification,
        Order,
        OrderNumber,
        OrderStatus,
        PaymentAttempt,
        Role,
        StatusChange,
    },
    traits::{
        AccountDirectory,
        AccountDirectoryError,
        NotificationStore,
        NotificationStoreError,
        OrderStore,
        OrderStoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, reading the URL from `SPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Creates or updates an account. Account management proper lives outside the payment gateway; this exists for
    /// provisioning and tests.
    pub async fn upsert_account(&self, subject_id: &str, email: &str, role: Role) -> Result<Account, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        accounts::upsert_account(subject_id, email, role, &mut conn).await
    }
}

impl OrderStore for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn get_status(&self, order_number: &OrderNumber) -> Result<Option<OrderStatus>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let status = orders::fetch_status(order_number, &mut conn).await?;
        Ok(status)
    }

    async fn compare_and_set_status(
        &self,
        order_number: &OrderNumber,
        expected: OrderStatus,
        new_status: OrderStatus,
        source: &str,
    ) -> Result<bool, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::compare_and_set_status(order_number, expected, new_status, source, &mut tx).await?;
        if updated {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(updated)
    }

    async fn fetch_pending_orders_older_than(&self, age: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_pending_orders_older_than(age, &mut conn).await?;
        trace!("🗃️ {} pending orders older than {age}", orders.len());
        Ok(orders)
    }

    async fn fetch_status_history(&self, order_number: &OrderNumber) -> Result<Vec<StatusChange>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_status_history(order_number, &mut conn).await?;
        Ok(history)
    }

    async fn insert_payment_attempt(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        attempts::insert_attempt(attempt, &mut conn).await
    }

    async fn fetch_payment_attempts(&self, order_number: &OrderNumber) -> Result<Vec<PaymentAttempt>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let attempts = attempts::fetch_attempts_for_order(order_number, &mut conn).await?;
        Ok(attempts)
    }

    async fn update_attempt_status(&self, reference: &str, gateway_status: &str) -> Result<(), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let n = attempts::update_attempt_status(reference, gateway_status, &mut conn).await?;
        if n == 0 {
            trace!("🗃️ No payment attempt with reference {reference}. Status {gateway_status} not recorded.");
        }
        Ok(())
    }
}

impl NotificationStore for SqliteDatabase {
    async fn append_notification(&self, notification: NewNotification) -> Result<Notification, NotificationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let notification = notifications::insert_notification(notification, &mut conn).await?;
        Ok(notification)
    }

    async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>, NotificationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_notifications_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: &str,
    ) -> Result<Option<Notification>, NotificationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::mark_read(id, user_id, &mut conn).await?;
        Ok(result)
    }
}

impl AccountDirectory for SqliteDatabase {
    async fn fetch_account_by_subject(&self, subject_id: &str) -> Result<Option<Account>, AccountDirectoryError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account_by_subject(subject_id, &mut conn).await?;
        Ok(account)
    }
}
