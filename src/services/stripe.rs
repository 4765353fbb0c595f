//! Card processor client.
//!
//! Only intent creation is called from the service; confirmation happens in
//! the payer's browser and settlement arrives through the webhook.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::StripeSettings;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Stripe error ({status}, {kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("Amount must be a positive number of minor units, got {0}")]
    InvalidAmount(i64),
}

/// Intent as returned by the REST API and embedded in webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: Vec<(String, String)>,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, ProcessorError>;
}

// { "error": { "type": ..., "message": ... } }
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    api_base: String,
    api_version: Option<String>,
}

impl StripeClient {
    pub fn new(settings: &StripeSettings) -> Result<Self, ProcessorError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            secret_key: settings.secret_key.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_version: settings.api_version.clone().filter(|v| !v.is_empty()),
        })
    }

    fn map_error(status: StatusCode, body: &str) -> ProcessorError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ProcessorError::Api {
                status: status.as_u16(),
                kind: envelope.error.kind,
                message: envelope.error.message.unwrap_or_default(),
            },
            Err(_) => ProcessorError::Api {
                status: status.as_u16(),
                kind: "unknown".to_string(),
                message: body.chars().take(200).collect(),
            },
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    // POST /v1/payment_intents, form encoded
    #[instrument(skip(self, intent), fields(amount_minor = intent.amount_minor, currency = %intent.currency))]
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, ProcessorError> {
        if intent.amount_minor <= 0 {
            return Err(ProcessorError::InvalidAmount(intent.amount_minor));
        }

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), intent.amount_minor.to_string()),
            ("currency".to_string(), intent.currency.to_ascii_lowercase()),
        ];
        for (key, value) in intent.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let mut request = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form);
        if let Some(version) = &self.api_version {
            request = request.header("Stripe-Version", version);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = Self::map_error(status, &body);
            warn!(error = %err, "Stripe rejected payment intent");
            return Err(err);
        }

        let created: PaymentIntent = serde_json::from_str(&body).map_err(|e| ProcessorError::Api {
            status: status.as_u16(),
            kind: "decode_error".to_string(),
            message: e.to_string(),
        })?;

        info!(payment_intent_id = %created.id, "Created payment intent");
        Ok(created)
    }
}
