use chrono::{Duration, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use super::single_row;
use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatus, StatusChange},
    traits::OrderStoreError,
};

/// Inserts a new order in `PENDING`. Fails with [`OrderStoreError::OrderAlreadyExists`] if the order number is taken.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let order_number = order.order_number.clone();
    let result: Result<Vec<Order>, _> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                owner_id,
                status,
                total_amount,
                shipping_cost,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.owner_id)
    .bind(OrderStatus::Pending)
    .bind(order.total_amount)
    .bind(order.shipping_cost)
    .bind(order.created_at)
    .fetch_all(conn)
    .await;
    match result.and_then(single_row) {
        Ok(order) => {
            debug!("🗃️ Order {} inserted with id {}", order.order_number, order.id);
            Ok(order)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(OrderStoreError::OrderAlreadyExists(order_number)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_status(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatus>, sqlx::Error> {
    let status: Option<(OrderStatus,)> = sqlx::query_as("SELECT status FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(status.map(|(s,)| s))
}

/// The conditional status write. Not atomic on its own: call it inside a transaction and pass `&mut *tx`, so that the
/// update and its history row land together.
///
/// Returns `false` if the order's status is not `expected` (or the order does not exist). Nothing is written in that
/// case.
pub async fn compare_and_set_status(
    order_number: &OrderNumber,
    expected: OrderStatus,
    new_status: OrderStatus,
    source: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE order_number = $3 AND status = $4")
        .bind(new_status)
        .bind(now)
        .bind(order_number.as_str())
        .bind(expected)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        trace!("🗃️ Conditional update of {order_number} ({expected} -> {new_status}) matched no rows");
        return Ok(false);
    }
    sqlx::query(
        r#"
        INSERT INTO order_status_history (order_number, old_status, new_status, source, changed_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order_number.as_str())
    .bind(expected)
    .bind(new_status)
    .bind(source)
    .bind(now)
    .execute(conn)
    .await?;
    debug!("🗃️ Order {order_number} status set from {expected} to {new_status} ({source})");
    Ok(true)
}

/// `PENDING` orders created more than `age` ago, oldest first.
pub async fn fetch_pending_orders_older_than(
    age: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let cutoff = Utc::now() - age;
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE status = $1 AND julianday(created_at) < julianday($2)
        ORDER BY created_at ASC
        "#,
    )
    .bind(OrderStatus::Pending)
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_status_history(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusChange>, sqlx::Error> {
    let history = sqlx::query_as("SELECT * FROM order_status_history WHERE order_number = $1 ORDER BY id ASC")
        .bind(order_number.as_str())
        .fetch_all(conn)
        .await?;
    Ok(history)
}
