//! Pure ledger arithmetic.
//!
//! Status derivation, the display projection, payment settlement and late-fee
//! accrual live here so the store implementations, the intent issuer and the
//! listing endpoints all compute them the same way.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::payment_record::{PaymentRecord, PaymentStatus};
use crate::models::payment_request::PaymentRequest;

/// `paid` once the payer covered dues plus fees, `partial` in between,
/// `pending` before the first confirmed payment.
pub fn derive_status(amount_due: Decimal, amount_paid: Decimal, late_fee_applied: Decimal) -> PaymentStatus {
    if amount_paid <= Decimal::ZERO {
        PaymentStatus::Pending
    } else if amount_paid >= amount_due + late_fee_applied {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl From<PaymentStatus> for DisplayStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => DisplayStatus::Pending,
            PaymentStatus::Partial => DisplayStatus::Partial,
            PaymentStatus::Paid => DisplayStatus::Paid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub remaining_balance: Decimal,
    pub is_overdue: bool,
    pub display_status: DisplayStatus,
}

pub fn project(
    amount_due: Decimal,
    amount_paid: Decimal,
    late_fee_applied: Decimal,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Projection {
    let remaining_balance = (amount_due + late_fee_applied - amount_paid).max(Decimal::ZERO);
    let is_overdue = due_date < now && remaining_balance > Decimal::ZERO;
    let display_status = if is_overdue {
        DisplayStatus::Overdue
    } else {
        derive_status(amount_due, amount_paid, late_fee_applied).into()
    };

    Projection {
        remaining_balance,
        is_overdue,
        display_status,
    }
}

pub fn project_record(record: &PaymentRecord, due_date: DateTime<Utc>, now: DateTime<Utc>) -> Projection {
    project(
        record.amount_due,
        record.amount_paid,
        record.late_fee_applied,
        due_date,
        now,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub amount_paid: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub became_paid: bool,
}

/// New ledger state after a confirmed charge of `amount`.
///
/// Non-positive amounts leave `amount_paid` untouched. `paid_at` is stamped
/// on the transition into `paid` and kept afterwards.
pub fn settle(record: &PaymentRecord, amount: Decimal, now: DateTime<Utc>) -> Settlement {
    let amount_paid = record.amount_paid + amount.max(Decimal::ZERO);
    let status = derive_status(record.amount_due, amount_paid, record.late_fee_applied);
    let became_paid = status == PaymentStatus::Paid && record.status != PaymentStatus::Paid;
    let paid_at = if became_paid { Some(now) } else { record.paid_at };

    Settlement {
        amount_paid,
        status,
        paid_at,
        became_paid,
    }
}

/// Fee owed once the grace period after the due date has elapsed, if the
/// record is still open and has not been charged a fee yet.
pub fn late_fee_due(request: &PaymentRequest, record: &PaymentRecord, now: DateTime<Utc>) -> Option<Decimal> {
    if request.late_fee_amount <= Decimal::ZERO || record.late_fee_applied > Decimal::ZERO {
        return None;
    }
    if record.status == PaymentStatus::Paid {
        return None;
    }
    let grace_ends = request.due_date + Duration::days(i64::from(request.late_fee_days.max(0)));
    if now <= grace_ends {
        return None;
    }
    Some(request.late_fee_amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateFeeAccrual {
    pub late_fee_applied: Decimal,
    pub status: PaymentStatus,
}

/// Applied under the store's per-record lock; `None` when the record settled
/// or was charged in the meantime.
pub fn accrue_late_fee(record: &PaymentRecord, fee: Decimal) -> Option<LateFeeAccrual> {
    if fee <= Decimal::ZERO
        || record.late_fee_applied > Decimal::ZERO
        || record.status == PaymentStatus::Paid
    {
        return None;
    }
    Some(LateFeeAccrual {
        late_fee_applied: fee,
        status: derive_status(record.amount_due, record.amount_paid, fee),
    })
}

/// Currency units to the processor's minor units, rounding half away from
/// zero.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
