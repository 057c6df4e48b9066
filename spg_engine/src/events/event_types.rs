use serde::Serialize;

use crate::db_types::Notification;

/// Emitted after a notification has been persisted. `channel` is the owner's real-time channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub channel: String,
    pub notification: Notification,
}

impl NotificationEvent {
    pub fn new(notification: Notification) -> Self {
        let channel = user_channel(&notification.user_id);
        Self { channel, notification }
    }
}

/// The real-time channel name for a user.
pub fn user_channel(user_id: &str) -> String {
    format!("user-{user_id}")
}
