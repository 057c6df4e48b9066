use thiserror::Error;

use crate::db_types::{NewNotification, Notification};

#[derive(Debug, Clone, Error)]
pub enum NotificationStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for NotificationStoreError {
    fn from(e: sqlx::Error) -> Self {
        NotificationStoreError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait NotificationStore: Clone {
    async fn append_notification(&self, notification: NewNotification) -> Result<Notification, NotificationStoreError>;

    /// Notifications for the user, newest first.
    async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>, NotificationStoreError>;

    /// Sets `read_at` on the notification if it belongs to `user_id`. Already-read notifications keep their original
    /// `read_at`. Returns `None` if there is no such notification for this user.
    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: &str,
    ) -> Result<Option<Notification>, NotificationStoreError>;
}
