//! Payment intent creation for a payer's own records.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::database::store::Store;
use crate::error::ApiError;
use crate::services::ledger;
use crate::services::stripe::{NewPaymentIntent, PaymentProcessor};
use crate::services::webhook::RECORD_METADATA_KEY;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
}

pub struct IntentIssuer {
    store: Arc<dyn Store>,
    processor: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl IntentIssuer {
    pub fn new(store: Arc<dyn Store>, processor: Arc<dyn PaymentProcessor>, currency: impl Into<String>) -> Self {
        Self {
            store,
            processor,
            currency: currency.into(),
        }
    }

    /// Create an intent for `amount` against a record the payer owns.
    ///
    /// `amount` is rounded to cents before any balance check, so the checks
    /// see exactly what the processor charges. The ledger is untouched; only
    /// the webhook moves `amount_paid`. If the intent id cannot be stored on
    /// the record the call fails without handing out the client secret, and
    /// the unconfirmed intent is left to expire.
    #[instrument(skip(self, now), fields(%payer_id, %record_id, %amount))]
    pub async fn issue(
        &self,
        payer_id: Uuid,
        record_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<IssuedIntent, ApiError> {
        let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount <= Decimal::ZERO {
            return Err(ApiError::invalid_input("Amount must be greater than zero"));
        }

        let payer_record = self
            .store
            .find_record_for_payer(record_id, payer_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Payment record not found"))?;

        let projection = ledger::project_record(
            &payer_record.record,
            payer_record.payment_request.due_date,
            now,
        );
        let remaining = projection.remaining_balance;
        if remaining <= Decimal::ZERO {
            return Err(ApiError::invalid_input("Payment record is already paid"));
        }
        if amount > remaining {
            return Err(ApiError::invalid_input(format!(
                "Amount exceeds remaining balance of {}",
                remaining
            )));
        }
        if !payer_record.payment_request.allow_partial && amount != remaining {
            return Err(ApiError::invalid_input(format!(
                "Partial payments are not allowed; pay the full balance of {}",
                remaining
            )));
        }

        let amount_minor = ledger::to_minor_units(amount)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| ApiError::invalid_input("Amount is too small"))?;

        let intent = self
            .processor
            .create_payment_intent(NewPaymentIntent {
                amount_minor,
                currency: self.currency.clone(),
                metadata: vec![
                    (RECORD_METADATA_KEY.to_string(), record_id.to_string()),
                    ("user_id".to_string(), payer_id.to_string()),
                ],
            })
            .await
            .map_err(|e| {
                error!("Failed to create payment intent: {}", e);
                ApiError::UpstreamFailure("Failed to create payment intent".to_string())
            })?;

        let Some(client_secret) = intent.client_secret.clone() else {
            error!(payment_intent_id = %intent.id, "Processor returned no client secret");
            return Err(ApiError::UpstreamFailure(
                "Payment processor returned no client secret".to_string(),
            ));
        };

        if let Err(e) = self.store.set_payment_intent(record_id, &intent.id).await {
            warn!(payment_intent_id = %intent.id, "Failed to remember intent on record: {}", e);
            return Err(e.into());
        }

        info!(payment_intent_id = %intent.id, amount_minor, "Issued payment intent");
        Ok(IssuedIntent {
            client_secret,
            payment_intent_id: intent.id,
        })
    }
}
