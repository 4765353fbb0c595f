#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use teamdues::config::{AuthSettings, DatabaseSettings, Settings, StripeSettings};
use teamdues::database::MemoryStore;
use teamdues::services::push::{DeliveryStatus, PushError, PushPayload, PushSender};
use teamdues::services::stripe::{NewPaymentIntent, PaymentIntent, PaymentProcessor, ProcessorError};
use teamdues::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const SERVICE_TOKEN: &str = "service-token";

pub fn settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            url: "postgres://unused".to_string(),
            ..Default::default()
        },
        auth: AuthSettings {
            jwt_secret: "integration-secret".to_string(),
            audience: None,
            service_token: SERVICE_TOKEN.to_string(),
        },
        stripe: StripeSettings {
            secret_key: "sk_test_integration".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeProcessor {
    pub created: Mutex<Vec<NewPaymentIntent>>,
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, ProcessorError> {
        let mut created = self.created.lock().unwrap();
        let id = format!("pi_test_{}", created.len() + 1);
        let response = PaymentIntent {
            id: id.clone(),
            amount: intent.amount_minor,
            currency: intent.currency.clone(),
            status: "requires_payment_method".to_string(),
            client_secret: Some(format!("{id}_secret_abc")),
            metadata: intent.metadata.iter().cloned().collect(),
        };
        created.push(intent);
        Ok(response)
    }
}

/// Push transport answering with a fixed status per endpoint (201 otherwise).
#[derive(Default)]
pub struct FakePush {
    pub statuses: Mutex<HashMap<String, u16>>,
    pub attempts: Mutex<Vec<String>>,
}

impl FakePush {
    pub fn answer(&self, endpoint: &str, status: u16) {
        self.statuses.lock().unwrap().insert(endpoint.to_string(), status);
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl PushSender for FakePush {
    async fn send(&self, endpoint: &str, _payload: &PushPayload) -> Result<DeliveryStatus, PushError> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        let status = self.statuses.lock().unwrap().get(endpoint).copied().unwrap_or(201);
        Ok(DeliveryStatus::from_status(reqwest::StatusCode::from_u16(status).unwrap()))
    }
}

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub processor: Arc<FakeProcessor>,
    pub push: Arc<FakePush>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let processor = Arc::new(FakeProcessor::default());
        let push = Arc::new(FakePush::default());
        let state = AppState::new(settings(), store.clone(), processor.clone(), push.clone());
        Self {
            store,
            processor,
            push,
            state,
        }
    }

    pub fn bearer(&self, user_id: Uuid) -> (actix_web::http::header::HeaderName, String) {
        let token = self.state.auth.generate_token(user_id, None).unwrap();
        (actix_web::http::header::AUTHORIZATION, format!("Bearer {token}"))
    }
}

/// Decimals go over the wire as strings; accept either form.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {other}"),
    }
}
