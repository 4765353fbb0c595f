//! In-memory store.
//!
//! Mirrors the PostgreSQL semantics closely enough for service and HTTP
//! tests: one mutex guards all tables, which gives the same per-record
//! atomicity the row locks give in PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::database::store::{Store, StoreError};
use crate::models::blast_message::{BlastMessage, NewBlastMessage};
use crate::models::notification::{NewNotification, Notification};
use crate::models::payment_record::{
    ConfirmedPayment, PayerRecord, PaymentRecord, PaymentStatus, SettlementOutcome,
};
use crate::models::payment_request::{NewPaymentRequest, PaymentRequest};
use crate::models::push_subscription::{NewPushSubscription, PushSubscription};
use crate::models::team::{TeamMember, TeamRole};
use crate::services::ledger;

#[derive(Default)]
struct Tables {
    requests: HashMap<Uuid, PaymentRequest>,
    records: HashMap<Uuid, PaymentRecord>,
    processed_events: HashSet<String>,
    team_members: Vec<TeamMember>,
    notifications: Vec<Notification>,
    push_subscriptions: Vec<PushSubscription>,
    blasts: Vec<BlastMessage>,
}

impl Tables {
    fn join(&self, record: &PaymentRecord) -> Option<PayerRecord> {
        self.requests
            .get(&record.payment_request_id)
            .map(|payment_request| PayerRecord {
                record: record.clone(),
                payment_request: payment_request.clone(),
            })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    intent_writes_fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) {
        self.tables().team_members.push(TeamMember {
            team_id,
            user_id,
            role,
            created_at: Utc::now(),
        });
    }

    pub fn record(&self, id: Uuid) -> Option<PaymentRecord> {
        self.tables().records.get(&id).cloned()
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.tables()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.tables().notifications.len()
    }

    pub fn push_subscription_count(&self) -> usize {
        self.tables().push_subscriptions.len()
    }

    pub fn blasts(&self) -> Vec<BlastMessage> {
        self.tables().blasts.clone()
    }

    /// Make `set_payment_intent` fail as if the database were unreachable.
    pub fn fail_intent_writes(&self) {
        self.intent_writes_fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_payment_request(
        &self,
        request: NewPaymentRequest,
        payer_ids: &[Uuid],
    ) -> Result<(PaymentRequest, Vec<PaymentRecord>), StoreError> {
        let now = Utc::now();
        let created = PaymentRequest {
            id: Uuid::new_v4(),
            team_id: request.team_id,
            created_by: request.created_by,
            title: request.title,
            description: request.description,
            amount: request.amount,
            due_date: request.due_date,
            allow_partial: request.allow_partial,
            late_fee_amount: request.late_fee_amount,
            late_fee_days: request.late_fee_days,
            recurring_interval: request.recurring_interval,
            created_at: now,
        };

        let records: Vec<PaymentRecord> = payer_ids
            .iter()
            .map(|payer_id| PaymentRecord {
                id: Uuid::new_v4(),
                payment_request_id: created.id,
                parent_id: *payer_id,
                amount_due: created.amount,
                amount_paid: Decimal::ZERO,
                late_fee_applied: Decimal::ZERO,
                status: PaymentStatus::Pending,
                stripe_payment_intent_id: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let mut tables = self.tables();
        tables.requests.insert(created.id, created.clone());
        for record in &records {
            tables.records.insert(record.id, record.clone());
        }
        Ok((created, records))
    }

    async fn find_payment_request(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError> {
        Ok(self.tables().requests.get(&id).cloned())
    }

    async fn records_for_request(&self, request_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError> {
        let mut records: Vec<PaymentRecord> = self
            .tables()
            .records
            .values()
            .filter(|r| r.payment_request_id == request_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn records_for_payer(&self, payer_id: Uuid) -> Result<Vec<PayerRecord>, StoreError> {
        let tables = self.tables();
        let mut joined: Vec<PayerRecord> = tables
            .records
            .values()
            .filter(|r| r.parent_id == payer_id)
            .filter_map(|r| tables.join(r))
            .collect();
        joined.sort_by_key(|pr| pr.payment_request.due_date);
        Ok(joined)
    }

    async fn find_record_for_payer(
        &self,
        record_id: Uuid,
        payer_id: Uuid,
    ) -> Result<Option<PayerRecord>, StoreError> {
        let tables = self.tables();
        Ok(tables
            .records
            .get(&record_id)
            .filter(|r| r.parent_id == payer_id)
            .and_then(|r| tables.join(r)))
    }

    async fn set_payment_intent(&self, record_id: Uuid, intent_id: &str) -> Result<(), StoreError> {
        if self.intent_writes_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        if let Some(record) = self.tables().records.get_mut(&record_id) {
            record.stripe_payment_intent_id = Some(intent_id.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_confirmed_payment(
        &self,
        payment: &ConfirmedPayment,
    ) -> Result<SettlementOutcome, StoreError> {
        let mut tables = self.tables();

        let Some(existing) = tables.records.get(&payment.payment_record_id).cloned() else {
            return Ok(SettlementOutcome::RecordNotFound);
        };
        if !tables.processed_events.insert(payment.event_id.clone()) {
            return Ok(SettlementOutcome::Duplicate);
        }

        let settlement = ledger::settle(&existing, payment.amount, payment.received_at);
        let record = PaymentRecord {
            amount_paid: settlement.amount_paid,
            status: settlement.status,
            paid_at: settlement.paid_at,
            updated_at: payment.received_at,
            ..existing
        };
        tables.records.insert(record.id, record.clone());

        Ok(SettlementOutcome::Applied {
            record,
            became_paid: settlement.became_paid,
        })
    }

    async fn apply_late_fee(
        &self,
        record_id: Uuid,
        fee: Decimal,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let mut tables = self.tables();
        let Some(record) = tables.records.get_mut(&record_id) else {
            return Ok(None);
        };
        let Some(accrual) = ledger::accrue_late_fee(record, fee) else {
            return Ok(None);
        };
        record.late_fee_applied = accrual.late_fee_applied;
        record.status = accrual.status;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>, StoreError> {
        Ok(self
            .tables()
            .team_members
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .map(|m| m.role))
    }

    async fn team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        Ok(self
            .tables()
            .team_members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn create_blast(&self, blast: NewBlastMessage) -> Result<BlastMessage, StoreError> {
        let created = BlastMessage {
            id: Uuid::new_v4(),
            team_id: blast.team_id,
            sent_by: blast.sent_by,
            subject: blast.subject,
            message: blast.message,
            created_at: Utc::now(),
        };
        self.tables().blasts.push(created.clone());
        Ok(created)
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables();
        for n in notifications {
            tables.notifications.push(Notification {
                id: Uuid::new_v4(),
                user_id: n.user_id,
                team_id: n.team_id,
                kind: n.kind,
                title: n.title.clone(),
                message: n.message.clone(),
                read: false,
                created_at: now,
            });
        }
        Ok(notifications.len() as u64)
    }

    async fn unread_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut unread: Vec<Notification> = self
            .tables()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        unread.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(unread)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn push_subscriptions_for(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(self
            .tables()
            .push_subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .push_subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            existing.user_id = subscription.user_id;
            existing.p256dh_key = subscription.p256dh_key;
            existing.auth_key = subscription.auth_key;
            return Ok(existing.clone());
        }

        let created = PushSubscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            endpoint: subscription.endpoint,
            p256dh_key: subscription.p256dh_key,
            auth_key: subscription.auth_key,
            created_at: Utc::now(),
        };
        tables.push_subscriptions.push(created.clone());
        Ok(created)
    }

    async fn remove_push_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.push_subscriptions.len();
        tables
            .push_subscriptions
            .retain(|s| !(s.user_id == user_id && s.endpoint == endpoint));
        Ok(tables.push_subscriptions.len() < before)
    }

    async fn delete_push_subscription(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables().push_subscriptions.retain(|s| s.id != id);
        Ok(())
    }
}
