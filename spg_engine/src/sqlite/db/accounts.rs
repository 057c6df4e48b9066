use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use super::single_row;
use crate::db_types::{Account, Role};

pub async fn fetch_account_by_subject(
    subject_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, sqlx::Error> {
    let account =
        sqlx::query_as("SELECT * FROM accounts WHERE subject_id = $1").bind(subject_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Creates the account, or updates the email and role of an existing one.
pub async fn upsert_account(
    subject_id: &str,
    email: &str,
    role: Role,
    conn: &mut SqliteConnection,
) -> Result<Account, sqlx::Error> {
    let rows: Vec<Account> = sqlx::query_as(
        r#"
        INSERT INTO accounts (subject_id, email, role, created_at) VALUES ($1, $2, $3, $4)
        ON CONFLICT (subject_id) DO UPDATE SET email = excluded.email, role = excluded.role
        RETURNING *;
        "#,
    )
    .bind(subject_id)
    .bind(email)
    .bind(role)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?;
    let account = single_row(rows)?;
    debug!("🗃️ Account {} ({}) saved as {}", account.subject_id, account.email, account.role);
    Ok(account)
}
