//! Turns accepted order transitions into user notifications.
//!
//! Dispatch runs after the order write has been committed and is strictly best-effort. The order status is the source
//! of truth; a notification that fails to persist or to push is logged and dropped, and never fails the caller.
use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::NotificationApiError,
    db_types::{Identity, NewNotification, Notification, Order, OrderStatus},
    events::{EventProducers, NotificationEvent},
    traits::NotificationStore,
};

pub const ORDER_NOTIFICATION_KIND: &str = "order";

struct Template {
    title: &'static str,
    message: &'static str,
}

/// The per-status message table. `{order}` is replaced with the order number.
fn template_for(status: OrderStatus) -> Option<Template> {
    let t = match status {
        OrderStatus::Pending => return None,
        OrderStatus::Paid => Template {
            title: "Payment confirmed",
            message: "We have received your payment for order {order}. We'll start preparing it right away.",
        },
        OrderStatus::Processing => {
            Template { title: "Order is being processed", message: "Order {order} is being packed for shipping." }
        },
        OrderStatus::Shipped => {
            Template { title: "Order shipped", message: "Order {order} is on its way to you." }
        },
        OrderStatus::Delivered => {
            Template { title: "Order delivered", message: "Order {order} has been delivered. Enjoy!" }
        },
        OrderStatus::Completed => {
            Template { title: "Order completed", message: "Order {order} is complete. Thank you for shopping with us." }
        },
        OrderStatus::Cancelled => Template {
            title: "Order cancelled",
            message: "Order {order} has been cancelled. If you already paid, a refund will be arranged.",
        },
        OrderStatus::Failed => Template {
            title: "Payment failed",
            message: "The payment for order {order} could not be completed. Please contact us if you need help.",
        },
    };
    Some(t)
}

/// Builds the notification for a transition into `to`, or `None` if that status has no template.
pub fn render_notification(order: &Order, to: OrderStatus) -> Option<NewNotification> {
    let template = template_for(to)?;
    let number = order.order_number.as_str();
    Some(NewNotification {
        user_id: order.owner_id.clone(),
        title: template.title.to_string(),
        message: template.message.replace("{order}", number),
        kind: ORDER_NOTIFICATION_KIND.to_string(),
        url: Some(format!("/orders/{number}")),
    })
}

#[derive(Clone)]
pub struct NotificationDispatcher<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for NotificationDispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationDispatcher")
    }
}

impl<B> NotificationDispatcher<B>
where B: NotificationStore
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Persists and publishes the notification for a committed `from -> to` transition.
    ///
    /// Returns the stored notification, or `None` if nothing was stored. Never fails.
    pub async fn dispatch(&self, order: &Order, from: OrderStatus, to: OrderStatus) -> Option<Notification> {
        let Some(new_notification) = render_notification(order, to) else {
            debug!("🔔️ No notification template for {from} -> {to} on order {}", order.order_number);
            return None;
        };
        let notification = match self.db.append_notification(new_notification).await {
            Ok(n) => n,
            Err(e) => {
                error!("🔔️ Could not save notification for order {} ({from} -> {to}): {e}", order.order_number);
                return None;
            },
        };
        debug!("🔔️ Notification #{} saved for user {} ({from} -> {to})", notification.id, notification.user_id);
        if self.producers.notification_producer.is_empty() {
            trace!("🔔️ Real-time push is not configured. Notification #{} is stored only", notification.id);
        }
        for producer in &self.producers.notification_producer {
            producer.publish_event(NotificationEvent::new(notification.clone())).await;
        }
        Some(notification)
    }

    /// The caller's notifications, newest first.
    pub async fn notifications_for(&self, identity: &Identity) -> Result<Vec<Notification>, NotificationApiError> {
        let result = self.db.fetch_notifications(&identity.subject_id).await?;
        Ok(result)
    }

    pub async fn mark_read(&self, identity: &Identity, id: i64) -> Result<Notification, NotificationApiError> {
        self.db
            .mark_notification_read(id, &identity.subject_id)
            .await?
            .ok_or(NotificationApiError::NotFound(id))
    }
}
