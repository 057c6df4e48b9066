#![allow(dead_code)]
use chrono::{DateTime, Duration, Utc};
use log::*;
use mockall::mock;
use spg_common::Money;
use spg_engine::{
    db_types::{
        Identity,
        NewNotification,
        NewOrder,
        NewPaymentAttempt,
        Notification,
        Order,
        OrderNumber,
        OrderStatus,
        PaymentAttempt,
        PaymentMethod,
        Role,
        StatusChange,
    },
    events::EventProducers,
    gateway::{GatewayError, PaymentGateway, ProviderStatus, TransactionInstructions, TransactionStatus},
    traits::{NotificationStore, NotificationStoreError, OrderStore, OrderStoreError},
    NotificationDispatcher,
    ReconciliationApi,
    ReconciliationOptions,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const GOOD_SIGNATURE: &str = "c0ffee";

mock! {
    pub Gateway {}
    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }
    impl PaymentGateway for Gateway {
        async fn create_transaction(&self, order: &Order, method: PaymentMethod, customer_email: &str) -> Result<TransactionInstructions, GatewayError>;
        async fn query_status(&self, reference: &str) -> Result<TransactionStatus, GatewayError>;
        async fn query_status_for_order(&self, order_number: &OrderNumber) -> Result<TransactionStatus, GatewayError>;
        fn verify_callback(&self, body: &[u8], signature: &str) -> bool;
        fn parse_callback(&self, body: &[u8]) -> Result<TransactionStatus, GatewayError>;
    }
}

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl OrderStore for Store {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;
        async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, OrderStoreError>;
        async fn get_status(&self, order_number: &OrderNumber) -> Result<Option<OrderStatus>, OrderStoreError>;
        async fn compare_and_set_status(&self, order_number: &OrderNumber, expected: OrderStatus, new_status: OrderStatus, source: &str) -> Result<bool, OrderStoreError>;
        async fn fetch_pending_orders_older_than(&self, age: Duration) -> Result<Vec<Order>, OrderStoreError>;
        async fn fetch_status_history(&self, order_number: &OrderNumber) -> Result<Vec<StatusChange>, OrderStoreError>;
        async fn insert_payment_attempt(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, OrderStoreError>;
        async fn fetch_payment_attempts(&self, order_number: &OrderNumber) -> Result<Vec<PaymentAttempt>, OrderStoreError>;
        async fn update_attempt_status(&self, reference: &str, gateway_status: &str) -> Result<(), OrderStoreError>;
    }
    impl NotificationStore for Store {
        async fn append_notification(&self, notification: NewNotification) -> Result<Notification, NotificationStoreError>;
        async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>, NotificationStoreError>;
        async fn mark_notification_read(&self, id: i64, user_id: &str) -> Result<Option<Notification>, NotificationStoreError>;
    }
}

pub async fn prepare_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = format!("sqlite://{}/spg_engine_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to database");
    db.migrate().await.expect("Error running migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e}");
    }
}

pub fn options() -> ReconciliationOptions {
    ReconciliationOptions {
        query_timeout: std::time::Duration::from_millis(200),
        max_payment_attempts: 3,
        payment_expiry: Duration::hours(24),
        poll_min_age: Duration::minutes(5),
        poll_concurrency: 4,
    }
}

pub fn api_with(
    db: &SqliteDatabase,
    gateway: MockGateway,
    producers: EventProducers,
) -> ReconciliationApi<SqliteDatabase, MockGateway> {
    let notifications = NotificationDispatcher::new(db.clone(), producers);
    ReconciliationApi::new(db.clone(), gateway, notifications, options())
}

pub async fn seed_order(db: &SqliteDatabase, number: &str, owner: &str, created_at: DateTime<Utc>) -> Order {
    let order = NewOrder::new(number.into(), owner.to_string(), Money::from_major(150_000), Money::from_major(12_000))
        .with_created_at(created_at);
    db.insert_order(order).await.expect("Error inserting order")
}

pub async fn seed_attempt(db: &SqliteDatabase, number: &str, reference: &str) -> PaymentAttempt {
    let attempt =
        NewPaymentAttempt::new(number.into(), reference.to_string(), PaymentMethod::BriVa, "UNPAID".to_string());
    db.insert_payment_attempt(attempt).await.expect("Error inserting payment attempt")
}

pub fn identity(subject: &str, role: Role) -> Identity {
    Identity {
        subject_id: subject.to_string(),
        email: format!("{subject}@example.com"),
        role,
        token_expiry: Utc::now() + Duration::hours(1),
    }
}

pub fn report(number: &str, reference: &str, status: &str) -> TransactionStatus {
    TransactionStatus {
        reference: reference.to_string(),
        order_number: number.into(),
        status: ProviderStatus::from(status),
        paid_at: None,
    }
}

/// A gateway whose webhook checks accept [`GOOD_SIGNATURE`] and parse every body into `report`.
pub fn webhook_gateway(report: TransactionStatus) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_verify_callback().returning(|_, sig| sig == GOOD_SIGNATURE);
    gateway.expect_parse_callback().returning(move |_| Ok(report.clone()));
    gateway
}

pub fn test_order(number: &str, owner: &str, status: OrderStatus) -> Order {
    Order {
        id: 1,
        order_number: number.into(),
        owner_id: owner.to_string(),
        status,
        total_amount: Money::from_major(150_000),
        shipping_cost: Money::from_major(12_000),
        created_at: Utc::now() - Duration::hours(1),
        updated_at: Utc::now() - Duration::hours(1),
    }
}
