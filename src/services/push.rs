//! Web push delivery to a user's registered browser endpoints.

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PushSettings;
use crate::database::store::{Store, StoreError};
use crate::models::push_subscription::PushSubscription;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushData {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: PushData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The push service no longer knows the endpoint (404/410).
    Gone,
    Rejected(u16),
}

impl DeliveryStatus {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            DeliveryStatus::Delivered
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            DeliveryStatus::Gone
        } else {
            DeliveryStatus::Rejected(status.as_u16())
        }
    }
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, endpoint: &str, payload: &PushPayload) -> Result<DeliveryStatus, PushError>;
}

pub struct WebPushClient {
    http: Client,
    ttl_seconds: u32,
}

impl WebPushClient {
    pub fn new(settings: &PushSettings) -> Result<Self, PushError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            ttl_seconds: settings.ttl_seconds,
        })
    }
}

#[async_trait]
impl PushSender for WebPushClient {
    async fn send(&self, endpoint: &str, payload: &PushPayload) -> Result<DeliveryStatus, PushError> {
        let body = serde_json::to_vec(payload)?;

        let response = self
            .http
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header("TTL", self.ttl_seconds.to_string())
            .body(body)
            .send()
            .await?;

        Ok(DeliveryStatus::from_status(response.status()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub sent: usize,
    pub total: usize,
    #[serde(skip)]
    pub pruned: usize,
}

pub struct PushService {
    store: Arc<dyn Store>,
    sender: Arc<dyn PushSender>,
    icon: String,
}

impl PushService {
    pub fn new(store: Arc<dyn Store>, sender: Arc<dyn PushSender>, settings: &PushSettings) -> Self {
        Self {
            store,
            sender,
            icon: settings.icon.clone(),
        }
    }

    pub fn payload(&self, title: &str, message: &str, kind: Option<&str>) -> PushPayload {
        PushPayload {
            title: title.to_string(),
            body: message.to_string(),
            icon: self.icon.clone(),
            badge: self.icon.clone(),
            data: PushData {
                kind: kind.map(str::to_string),
            },
        }
    }

    /// Send to every subscription of `user_id` concurrently.
    ///
    /// One endpoint failing never stops the others. Endpoints the push
    /// service reports as gone are deleted and not counted as sent.
    #[instrument(skip(self, title, message), fields(%user_id))]
    pub async fn deliver_to_user(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        kind: Option<&str>,
    ) -> Result<PushReport, PushError> {
        let subscriptions = self.store.push_subscriptions_for(user_id).await?;
        if subscriptions.is_empty() {
            debug!("No push subscriptions");
            return Ok(PushReport::default());
        }

        let payload = self.payload(title, message, kind);
        let attempts = subscriptions
            .iter()
            .map(|subscription| self.deliver_one(subscription, &payload));
        let outcomes = join_all(attempts).await;

        let mut report = PushReport {
            total: subscriptions.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Some(DeliveryStatus::Delivered) => report.sent += 1,
                Some(DeliveryStatus::Gone) => report.pruned += 1,
                _ => {}
            }
        }

        info!(sent = report.sent, total = report.total, pruned = report.pruned, "Push delivery finished");
        Ok(report)
    }

    async fn deliver_one(&self, subscription: &PushSubscription, payload: &PushPayload) -> Option<DeliveryStatus> {
        match self.sender.send(&subscription.endpoint, payload).await {
            Ok(DeliveryStatus::Gone) => {
                info!(subscription_id = %subscription.id, "Pruning expired push subscription");
                if let Err(e) = self.store.delete_push_subscription(subscription.id).await {
                    error!(subscription_id = %subscription.id, "Failed to delete subscription: {}", e);
                }
                Some(DeliveryStatus::Gone)
            }
            Ok(DeliveryStatus::Rejected(status)) => {
                warn!(subscription_id = %subscription.id, status, "Push service rejected message");
                Some(DeliveryStatus::Rejected(status))
            }
            Ok(status) => Some(status),
            Err(e) => {
                warn!(subscription_id = %subscription.id, "Push delivery failed: {}", e);
                None
            }
        }
    }
}
