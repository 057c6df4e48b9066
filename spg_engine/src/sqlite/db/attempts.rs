use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use super::single_row;
use crate::{
    db_types::{NewPaymentAttempt, OrderNumber, PaymentAttempt},
    traits::OrderStoreError,
};

pub async fn insert_attempt(
    attempt: NewPaymentAttempt,
    conn: &mut SqliteConnection,
) -> Result<PaymentAttempt, OrderStoreError> {
    let reference = attempt.gateway_reference.clone();
    let now = Utc::now();
    let result: Result<Vec<PaymentAttempt>, _> = sqlx::query_as(
        r#"
        INSERT INTO payment_attempts (order_number, gateway_reference, method, gateway_status, created_at, checked_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING *;
        "#,
    )
    .bind(attempt.order_number.as_str())
    .bind(attempt.gateway_reference)
    .bind(attempt.method)
    .bind(attempt.gateway_status)
    .bind(now)
    .fetch_all(conn)
    .await;
    match result.and_then(single_row) {
        Ok(attempt) => {
            debug!("🗃️ Payment attempt {} recorded for order {}", attempt.gateway_reference, attempt.order_number);
            Ok(attempt)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(OrderStoreError::AttemptAlreadyExists(reference)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_attempts_for_order(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    let attempts = sqlx::query_as("SELECT * FROM payment_attempts WHERE order_number = $1 ORDER BY id ASC")
        .bind(order_number.as_str())
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}

pub async fn update_attempt_status(
    reference: &str,
    gateway_status: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE payment_attempts SET gateway_status = $1, checked_at = $2 WHERE gateway_reference = $3")
            .bind(gateway_status)
            .bind(Utc::now())
            .bind(reference)
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}
