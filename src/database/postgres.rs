use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::database::connection::DbPool;
use crate::database::store::{Store, StoreError};
use crate::models::blast_message::{BlastMessage, NewBlastMessage};
use crate::models::notification::{NewNotification, Notification};
use crate::models::payment_record::{ConfirmedPayment, PayerRecord, PaymentRecord, SettlementOutcome};
use crate::models::payment_request::{NewPaymentRequest, PaymentRequest};
use crate::models::push_subscription::{NewPushSubscription, PushSubscription};
use crate::models::team::{TeamMember, TeamRole};

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_request(&self, record: PaymentRecord) -> Result<Option<PayerRecord>, StoreError> {
        match PaymentRequest::find_by_id(&self.pool, record.payment_request_id).await? {
            Some(payment_request) => Ok(Some(PayerRecord {
                record,
                payment_request,
            })),
            None => {
                warn!(record_id = %record.id, "Payment record references a missing request");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_payment_request(
        &self,
        request: NewPaymentRequest,
        payer_ids: &[Uuid],
    ) -> Result<(PaymentRequest, Vec<PaymentRecord>), StoreError> {
        Ok(PaymentRequest::create_with_records(&self.pool, request, payer_ids).await?)
    }

    async fn find_payment_request(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError> {
        Ok(PaymentRequest::find_by_id(&self.pool, id).await?)
    }

    async fn records_for_request(&self, request_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(PaymentRecord::find_by_request(&self.pool, request_id).await?)
    }

    async fn records_for_payer(&self, payer_id: Uuid) -> Result<Vec<PayerRecord>, StoreError> {
        let records = PaymentRecord::find_by_payer(&self.pool, payer_id).await?;
        let mut joined = Vec::with_capacity(records.len());
        for record in records {
            if let Some(payer_record) = self.with_request(record).await? {
                joined.push(payer_record);
            }
        }
        Ok(joined)
    }

    async fn find_record_for_payer(
        &self,
        record_id: Uuid,
        payer_id: Uuid,
    ) -> Result<Option<PayerRecord>, StoreError> {
        match PaymentRecord::find_for_payer(&self.pool, record_id, payer_id).await? {
            Some(record) => self.with_request(record).await,
            None => Ok(None),
        }
    }

    async fn set_payment_intent(&self, record_id: Uuid, intent_id: &str) -> Result<(), StoreError> {
        if !PaymentRecord::set_payment_intent(&self.pool, record_id, intent_id).await? {
            warn!(%record_id, "Intent id not stored, record vanished");
        }
        Ok(())
    }

    async fn apply_confirmed_payment(
        &self,
        payment: &ConfirmedPayment,
    ) -> Result<SettlementOutcome, StoreError> {
        Ok(PaymentRecord::apply_confirmed_payment(&self.pool, payment).await?)
    }

    async fn apply_late_fee(
        &self,
        record_id: Uuid,
        fee: Decimal,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(PaymentRecord::apply_late_fee(&self.pool, record_id, fee).await?)
    }

    async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>, StoreError> {
        Ok(TeamMember::find_role(&self.pool, team_id, user_id).await?)
    }

    async fn team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        Ok(TeamMember::find_by_team(&self.pool, team_id).await?)
    }

    async fn create_blast(&self, blast: NewBlastMessage) -> Result<BlastMessage, StoreError> {
        Ok(BlastMessage::create(&self.pool, blast).await?)
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64, StoreError> {
        Ok(Notification::insert_many(&self.pool, notifications).await?)
    }

    async fn unread_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(Notification::find_unread(&self.pool, user_id, limit).await?)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(Notification::mark_read(&self.pool, id, user_id).await?)
    }

    async fn push_subscriptions_for(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(PushSubscription::find_by_user(&self.pool, user_id).await?)
    }

    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        Ok(PushSubscription::upsert(&self.pool, subscription).await?)
    }

    async fn remove_push_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool, StoreError> {
        Ok(PushSubscription::delete_for_user(&self.pool, user_id, endpoint).await?)
    }

    async fn delete_push_subscription(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(PushSubscription::delete(&self.pool, id).await?)
    }
}
