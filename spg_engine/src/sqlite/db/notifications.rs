use chrono::Utc;
use sqlx::SqliteConnection;

use super::single_row;
use crate::db_types::{NewNotification, Notification};

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    let rows: Vec<Notification> = sqlx::query_as(
        r#"
        INSERT INTO notifications (user_id, title, message, kind, url, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.kind)
    .bind(notification.url)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?;
    single_row(rows)
}

pub async fn fetch_notifications_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let result = sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(result)
}

/// Sets `read_at` if it is not already set. Only touches notifications owned by `user_id`.
pub async fn mark_read(id: i64, user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query("UPDATE notifications SET read_at = $1 WHERE id = $2 AND user_id = $3 AND read_at IS NULL")
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query_as("SELECT * FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(result)
}
