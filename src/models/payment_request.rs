use crate::database::connection::DbPool;
use crate::models::payment_record::{PaymentRecord, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "recurring_interval", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    Weekly,
    Monthly,
    Quarterly,
}

/// Billing terms a coach sets for a team.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub team_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub allow_partial: bool,
    pub late_fee_amount: Decimal,
    /// Grace period after `due_date` before the late fee accrues.
    pub late_fee_days: i32,
    pub recurring_interval: Option<RecurringInterval>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub team_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub allow_partial: bool,
    pub late_fee_amount: Decimal,
    pub late_fee_days: i32,
    pub recurring_interval: Option<RecurringInterval>,
}

impl PaymentRequest {
    /// Insert the request and one pending record per payer in a single
    /// transaction.
    pub async fn create_with_records(
        pool: &DbPool,
        request: NewPaymentRequest,
        payer_ids: &[Uuid],
    ) -> Result<(Self, Vec<PaymentRecord>), sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let created = sqlx::query_as::<_, PaymentRequest>(
            "INSERT INTO payment_requests
                (id, team_id, created_by, title, description, amount, due_date,
                 allow_partial, late_fee_amount, late_fee_days, recurring_interval, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(request.team_id)
        .bind(request.created_by)
        .bind(request.title)
        .bind(request.description)
        .bind(request.amount)
        .bind(request.due_date)
        .bind(request.allow_partial)
        .bind(request.late_fee_amount)
        .bind(request.late_fee_days)
        .bind(request.recurring_interval)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut records = Vec::with_capacity(payer_ids.len());
        for payer_id in payer_ids {
            let record = sqlx::query_as::<_, PaymentRecord>(
                "INSERT INTO payment_records
                    (id, payment_request_id, parent_id, amount_due, amount_paid,
                     late_fee_applied, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, 0, 0, $5, $6, $6)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(payer_id)
            .bind(created.amount)
            .bind(PaymentStatus::Pending)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            records.push(record);
        }

        tx.commit().await?;
        Ok((created, records))
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request =
            sqlx::query_as::<_, PaymentRequest>("SELECT * FROM payment_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(request)
    }
}
