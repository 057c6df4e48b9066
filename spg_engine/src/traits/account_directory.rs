use thiserror::Error;

use crate::db_types::Account;

#[derive(Debug, Clone, Error)]
pub enum AccountDirectoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AccountDirectoryError {
    fn from(e: sqlx::Error) -> Self {
        AccountDirectoryError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait AccountDirectory: Clone {
    async fn fetch_account_by_subject(&self, subject_id: &str) -> Result<Option<Account>, AccountDirectoryError>;
}
