//! Processor webhook verification and reconciliation.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::database::store::{Store, StoreError};
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::payment_record::{ConfirmedPayment, PaymentRecord, PaymentStatus, SettlementOutcome};
use crate::services::ledger;
use crate::services::stripe::PaymentIntent;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const RECORD_METADATA_KEY: &str = "payment_record_id";

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook secret not configured")]
    MissingSecret,
    #[error("No stripe signature")]
    MissingSignature,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Timestamp {timestamp} outside tolerance of {tolerance}s")]
    TimestampOutsideTolerance { timestamp: i64, tolerance: i64 },
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }
}

/// Check `t=<unix>,v1=<hex>` against HMAC-SHA256 of `"{t}.{payload}"`.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let header = header.ok_or(WebhookError::MissingSignature)?;

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature("no v1 signature".to_string()));
    }
    if (now - timestamp).abs() > tolerance_seconds {
        return Err(WebhookError::TimestampOutsideTolerance {
            timestamp,
            tolerance: tolerance_seconds,
        });
    }

    let mac = signing_mac(secret, timestamp, payload)?;
    // verify_slice compares in constant time
    let valid = signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(decoded) => mac.clone().verify_slice(&decoded).is_ok(),
        Err(_) => false,
    });

    if !valid {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }

    debug!(timestamp, "Webhook signature verified");
    Ok(())
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("Invalid secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Header value the processor would send for `payload` at `timestamp`.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let signature = hex::encode(signing_mac(secret, timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Settled {
        record_id: Uuid,
        status: PaymentStatus,
        became_paid: bool,
    },
    Duplicate,
    /// The event does not resolve to a known record.
    Unresolved,
    Ignored,
}

/// Applies confirmed charges to the ledger.
pub struct Reconciler {
    store: Arc<dyn Store>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle(&self, event: &StripeEvent, now: DateTime<Utc>) -> Result<ReconcileOutcome, WebhookError> {
        match event.event_type.as_str() {
            PAYMENT_SUCCEEDED => self.payment_succeeded(event, now).await,
            other => {
                info!(event_type = %other, "Ignoring unsupported event type");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn payment_succeeded(&self, event: &StripeEvent, now: DateTime<Utc>) -> Result<ReconcileOutcome, WebhookError> {
        let intent: PaymentIntent = serde_json::from_value(event.data.object.clone())
            .map_err(|e| WebhookError::MalformedPayload(format!("payment intent: {}", e)))?;

        let Some(record_id) = intent
            .metadata
            .get(RECORD_METADATA_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            warn!(payment_intent_id = %intent.id, "Payment intent carries no usable record id");
            return Ok(ReconcileOutcome::Unresolved);
        };

        let payment = ConfirmedPayment {
            event_id: event.id.clone(),
            payment_record_id: record_id,
            payment_intent_id: intent.id.clone(),
            amount: ledger::from_minor_units(intent.amount),
            received_at: now,
        };

        match self.store.apply_confirmed_payment(&payment).await? {
            SettlementOutcome::Applied { record, became_paid } => {
                info!(
                    %record_id,
                    amount = %payment.amount,
                    amount_paid = %record.amount_paid,
                    status = %record.status,
                    "Applied confirmed payment"
                );
                if became_paid {
                    self.notify_paid(&record).await;
                }
                Ok(ReconcileOutcome::Settled {
                    record_id,
                    status: record.status,
                    became_paid,
                })
            }
            SettlementOutcome::Duplicate => {
                info!(%record_id, "Event already applied, skipping");
                Ok(ReconcileOutcome::Duplicate)
            }
            SettlementOutcome::RecordNotFound => {
                warn!(%record_id, "Payment record not found for confirmed payment");
                Ok(ReconcileOutcome::Unresolved)
            }
        }
    }

    // The settlement is committed by now; a failed notification is logged
    // rather than turned into a redelivery.
    async fn notify_paid(&self, record: &PaymentRecord) {
        let request = match self.store.find_payment_request(record.payment_request_id).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                warn!(record_id = %record.id, "Paid record has no payment request");
                return;
            }
            Err(e) => {
                error!(record_id = %record.id, "Failed to load payment request: {}", e);
                return;
            }
        };

        let notification = NewNotification {
            user_id: record.parent_id,
            team_id: Some(request.team_id),
            kind: NotificationType::PaymentRequest,
            title: "Payment Received".to_string(),
            message: format!(
                "Your payment for \"{}\" has been processed successfully.",
                request.title
            ),
        };
        if let Err(e) = self.store.insert_notifications(&[notification]).await {
            error!(record_id = %record.id, "Failed to record payment notification: {}", e);
        }
    }
}
