use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::blast_message::{BlastMessage, NewBlastMessage};
use crate::models::notification::{NewNotification, Notification};
use crate::models::payment_record::{ConfirmedPayment, PayerRecord, PaymentRecord, SettlementOutcome};
use crate::models::payment_request::{NewPaymentRequest, PaymentRequest};
use crate::models::push_subscription::{NewPushSubscription, PushSubscription};
use crate::models::team::{TeamMember, TeamRole};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Everything the handlers need from the hosted relational store.
///
/// `apply_confirmed_payment` and `apply_late_fee` must be atomic per record:
/// implementations serialize concurrent calls for the same record and never
/// apply an event id twice.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_payment_request(
        &self,
        request: NewPaymentRequest,
        payer_ids: &[Uuid],
    ) -> Result<(PaymentRequest, Vec<PaymentRecord>), StoreError>;

    async fn find_payment_request(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError>;

    async fn records_for_request(&self, request_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError>;

    async fn records_for_payer(&self, payer_id: Uuid) -> Result<Vec<PayerRecord>, StoreError>;

    async fn find_record_for_payer(
        &self,
        record_id: Uuid,
        payer_id: Uuid,
    ) -> Result<Option<PayerRecord>, StoreError>;

    async fn set_payment_intent(&self, record_id: Uuid, intent_id: &str) -> Result<(), StoreError>;

    async fn apply_confirmed_payment(
        &self,
        payment: &ConfirmedPayment,
    ) -> Result<SettlementOutcome, StoreError>;

    async fn apply_late_fee(
        &self,
        record_id: Uuid,
        fee: Decimal,
    ) -> Result<Option<PaymentRecord>, StoreError>;

    async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>, StoreError>;

    async fn team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError>;

    async fn create_blast(&self, blast: NewBlastMessage) -> Result<BlastMessage, StoreError>;

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64, StoreError>;

    async fn unread_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn push_subscriptions_for(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError>;

    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError>;

    async fn remove_push_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool, StoreError>;

    async fn delete_push_subscription(&self, id: Uuid) -> Result<(), StoreError>;
}
