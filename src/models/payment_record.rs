use crate::database::connection::DbPool;
use crate::models::payment_request::PaymentRequest;
use crate::services::ledger;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// One payer's obligation against a payment request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub payment_request_id: Uuid,
    pub parent_id: Uuid,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub late_fee_applied: Decimal,
    pub status: PaymentStatus,
    /// Last intent issued for this record. Advisory only.
    pub stripe_payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record joined with the terms it was billed under.
#[derive(Debug, Clone, Serialize)]
pub struct PayerRecord {
    #[serde(flatten)]
    pub record: PaymentRecord,
    pub payment_request: PaymentRequest,
}

/// A charge the processor has confirmed, keyed by the processor's event id.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub event_id: String,
    pub payment_record_id: Uuid,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Applied {
        record: PaymentRecord,
        /// True only for the event that moved the record into `paid`.
        became_paid: bool,
    },
    /// The event id was applied before; nothing changed.
    Duplicate,
    RecordNotFound,
}

impl PaymentRecord {
    /// Absent and not-owned are indistinguishable to the caller.
    pub async fn find_for_payer(
        pool: &DbPool,
        id: Uuid,
        parent_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payment_records WHERE id = $1 AND parent_id = $2",
        )
        .bind(id)
        .bind(parent_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_payer(pool: &DbPool, parent_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, PaymentRecord>(
            "SELECT r.* FROM payment_records r
             JOIN payment_requests q ON q.id = r.payment_request_id
             WHERE r.parent_id = $1
             ORDER BY q.due_date ASC",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    pub async fn find_by_request(
        pool: &DbPool,
        payment_request_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payment_records WHERE payment_request_id = $1 ORDER BY created_at",
        )
        .bind(payment_request_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    pub async fn set_payment_intent(
        pool: &DbPool,
        id: Uuid,
        intent_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE payment_records
             SET stripe_payment_intent_id = $2, updated_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(intent_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a confirmed charge exactly once.
    ///
    /// The record row is locked for the whole transaction so concurrent
    /// deliveries for one record serialize, and the event id insert makes a
    /// redelivered event a no-op.
    pub async fn apply_confirmed_payment(
        pool: &DbPool,
        payment: &ConfirmedPayment,
    ) -> Result<SettlementOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payment_records WHERE id = $1 FOR UPDATE",
        )
        .bind(payment.payment_record_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            tx.rollback().await?;
            return Ok(SettlementOutcome::RecordNotFound);
        };

        let inserted = sqlx::query(
            "INSERT INTO processed_webhook_events
                (event_id, payment_record_id, payment_intent_id, amount, processed_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&payment.event_id)
        .bind(payment.payment_record_id)
        .bind(&payment.payment_intent_id)
        .bind(payment.amount)
        .bind(payment.received_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SettlementOutcome::Duplicate);
        }

        let settlement = ledger::settle(&existing, payment.amount, payment.received_at);

        let record = sqlx::query_as::<_, PaymentRecord>(
            "UPDATE payment_records
             SET amount_paid = $2, status = $3, paid_at = $4, updated_at = $5
             WHERE id = $1
             RETURNING *",
        )
        .bind(existing.id)
        .bind(settlement.amount_paid)
        .bind(settlement.status)
        .bind(settlement.paid_at)
        .bind(payment.received_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettlementOutcome::Applied {
            record,
            became_paid: settlement.became_paid,
        })
    }

    /// Add a late fee to a record that has none yet and is still owed.
    pub async fn apply_late_fee(
        pool: &DbPool,
        id: Uuid,
        fee: Decimal,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payment_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(accrual) = existing.as_ref().and_then(|r| ledger::accrue_late_fee(r, fee)) else {
            tx.rollback().await?;
            return Ok(None);
        };

        let record = sqlx::query_as::<_, PaymentRecord>(
            "UPDATE payment_records
             SET late_fee_applied = $2, status = $3, updated_at = $4
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(accrual.late_fee_applied)
        .bind(accrual.status)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }
}
