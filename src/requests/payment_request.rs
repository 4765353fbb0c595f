use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::payment_request::{NewPaymentRequest, RecurringInterval};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequestRequest {
    pub team_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
    #[serde(default = "default_late_fee_amount")]
    pub late_fee_amount: Decimal,
    #[serde(default = "default_late_fee_days")]
    pub late_fee_days: i32,
    pub recurring_interval: Option<RecurringInterval>,
}

fn default_allow_partial() -> bool {
    true
}

fn default_late_fee_amount() -> Decimal {
    Decimal::new(1500, 2)
}

fn default_late_fee_days() -> i32 {
    5
}

impl CreatePaymentRequestRequest {
    pub fn into_new(self, created_by: Uuid) -> NewPaymentRequest {
        NewPaymentRequest {
            team_id: self.team_id,
            created_by,
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            amount: self.amount,
            due_date: self.due_date,
            allow_partial: self.allow_partial,
            late_fee_amount: self.late_fee_amount,
            late_fee_days: self.late_fee_days,
            recurring_interval: self.recurring_interval,
        }
    }
}
