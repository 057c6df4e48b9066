//! Real-time push of user notifications over a hosted pub/sub service.
//!
//! Each notification is published to the owner's channel (`user-{id}`) as a `notification` event. Requests are signed
//! with an HMAC-SHA256 of the body, using the app secret.
//!
//! The push is installed as the engine's `on_notification_created` hook, so it runs on the event channel and never
//! delays a reconciliation. Failures are logged and dropped: the notification is already stored.
use std::{future::Future, pin::Pin, time::Duration};

use hmac::{Hmac, Mac};
use log::*;
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use spg_engine::events::{EventHooks, NotificationEvent};
use thiserror::Error;

use crate::config::RealtimeConfig;

pub const NOTIFICATION_EVENT_NAME: &str = "notification";
pub const KEY_HEADER: &str = "X-Realtime-Key";
pub const SIGNATURE_HEADER: &str = "X-Realtime-Signature";
const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Could not initialize the real-time client. {0}")]
    Initialization(String),
    #[error("Could not serialize the event. {0}")]
    Serialization(String),
    #[error("Push request failed. {0}")]
    RequestFailed(String),
    #[error("Push was rejected. Error {0}")]
    Rejected(u16),
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    name: &'a str,
    channel: &'a str,
    /// The notification, JSON-encoded. Subscribers decode it themselves.
    data: String,
}

#[derive(Clone)]
pub struct RealtimeClient {
    config: RealtimeConfig,
    client: Client,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Result<Self, RealtimeError> {
        let client =
            Client::builder().timeout(PUSH_TIMEOUT).build().map_err(|e| RealtimeError::Initialization(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn events_url(&self) -> String {
        format!("{}/apps/{}/events", self.config.url.trim_end_matches('/'), self.config.app_id)
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, RealtimeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.secret.reveal().as_bytes())
            .map_err(|e| RealtimeError::Initialization(e.to_string()))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn publish_body(event: &NotificationEvent) -> Result<Vec<u8>, RealtimeError> {
        let data =
            serde_json::to_string(&event.notification).map_err(|e| RealtimeError::Serialization(e.to_string()))?;
        let request = PublishRequest { name: NOTIFICATION_EVENT_NAME, channel: &event.channel, data };
        serde_json::to_vec(&request).map_err(|e| RealtimeError::Serialization(e.to_string()))
    }

    pub async fn publish(&self, event: &NotificationEvent) -> Result<(), RealtimeError> {
        let body = Self::publish_body(event)?;
        let signature = self.sign(&body)?;
        let response = self
            .client
            .post(self.events_url())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(KEY_HEADER, &self.config.key)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| RealtimeError::RequestFailed(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RealtimeError::Rejected(status.as_u16()))
        }
    }
}

/// Builds the event hooks for the server. With no real-time configuration, there are no hooks and notifications are
/// only stored.
pub fn realtime_hooks(config: Option<RealtimeConfig>) -> EventHooks {
    let mut hooks = EventHooks::default();
    let Some(config) = config else {
        return hooks;
    };
    let client = match RealtimeClient::new(config) {
        Ok(c) => c,
        Err(e) => {
            error!("🔔️ Real-time push is disabled. {e}");
            return hooks;
        },
    };
    hooks.on_notification_created(move |ev| {
        let client = client.clone();
        Box::pin(async move {
            match client.publish(&ev).await {
                Ok(()) => debug!("🔔️ Notification #{} pushed to {}", ev.notification.id, ev.channel),
                Err(e) => warn!("🔔️ Could not push notification #{} to {}. {e}", ev.notification.id, ev.channel),
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}
