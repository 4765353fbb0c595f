//! Coach-side billing: creating payment requests and accruing late fees.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::database::store::Store;
use crate::error::ApiError;
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::payment_request::{NewPaymentRequest, PaymentRequest};
use crate::models::team::TeamRole;
use crate::services::ledger;

#[derive(Debug, Clone)]
pub struct CreatedRequest {
    pub request: PaymentRequest,
    pub record_count: usize,
}

fn whole_cents(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}

pub struct BillingService {
    store: Arc<dyn Store>,
}

impl BillingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn require_coach(&self, team_id: Uuid, user_id: Uuid, action: &str) -> Result<(), ApiError> {
        match self.store.team_role(team_id, user_id).await? {
            Some(TeamRole::Coach) => Ok(()),
            _ => Err(ApiError::unauthorized(format!("Only coaches can {}", action))),
        }
    }

    /// Create the request and one pending record per team parent, then
    /// notify each of those parents.
    #[instrument(skip(self, request), fields(team_id = %request.team_id, coach_id = %request.created_by))]
    pub async fn create_request(&self, request: NewPaymentRequest) -> Result<CreatedRequest, ApiError> {
        if request.title.trim().is_empty() {
            return Err(ApiError::invalid_input("Title is required"));
        }
        if request.amount <= Decimal::ZERO {
            return Err(ApiError::invalid_input("Amount must be greater than zero"));
        }
        if request.late_fee_amount < Decimal::ZERO || request.late_fee_days < 0 {
            return Err(ApiError::invalid_input("Late fee terms cannot be negative"));
        }
        if !whole_cents(request.amount) || !whole_cents(request.late_fee_amount) {
            return Err(ApiError::invalid_input("Amounts cannot have fractions of a cent"));
        }
        self.require_coach(request.team_id, request.created_by, "create payment requests")
            .await?;

        let parents: Vec<Uuid> = self
            .store
            .team_members(request.team_id)
            .await?
            .into_iter()
            .filter(|member| member.role == TeamRole::Parent)
            .map(|member| member.user_id)
            .collect();

        let (created, records) = self.store.create_payment_request(request, &parents).await?;

        let message = format!(
            "{} - ${:.2} due by {}",
            created.title,
            created.amount,
            created.due_date.format("%m/%d/%Y")
        );
        let notifications: Vec<NewNotification> = records
            .iter()
            .map(|record| NewNotification {
                user_id: record.parent_id,
                team_id: Some(created.team_id),
                kind: NotificationType::PaymentRequest,
                title: "New Payment Request".to_string(),
                message: message.clone(),
            })
            .collect();
        if !notifications.is_empty() {
            if let Err(e) = self.store.insert_notifications(&notifications).await {
                error!(request_id = %created.id, "Failed to notify parents: {}", e);
            }
        }

        info!(request_id = %created.id, records = records.len(), "Payment request created");
        Ok(CreatedRequest {
            request: created,
            record_count: records.len(),
        })
    }

    /// Charge the request's late fee on every record whose grace period has
    /// lapsed. Returns how many records were charged.
    #[instrument(skip(self, now))]
    pub async fn accrue_late_fees(
        &self,
        coach_id: Uuid,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, ApiError> {
        let request = self
            .store
            .find_payment_request(request_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Payment request not found"))?;
        self.require_coach(request.team_id, coach_id, "apply late fees").await?;

        let mut applied = 0;
        for record in self.store.records_for_request(request.id).await? {
            let Some(fee) = ledger::late_fee_due(&request, &record, now) else {
                continue;
            };
            match self.store.apply_late_fee(record.id, fee).await? {
                Some(updated) => {
                    info!(record_id = %updated.id, %fee, status = %updated.status, "Late fee applied");
                    applied += 1;
                }
                None => warn!(record_id = %record.id, "Record changed before the late fee was applied"),
            }
        }

        Ok(applied)
    }
}
