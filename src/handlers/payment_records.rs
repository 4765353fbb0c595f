use actix_web::{HttpResponse, web};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::payment_record::PayerRecord;
use crate::services::ledger::{self, Projection};
use crate::state::AppState;
use crate::utils::helpers::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub outstanding: bool,
}

/// A record with its display projection as of the request time.
#[derive(Serialize)]
struct RecordView {
    #[serde(flatten)]
    record: PayerRecord,
    #[serde(flatten)]
    projection: Projection,
}

pub async fn index(
    state: web::Data<AppState>,
    query: web::Query<RecordsQuery>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    info!("Listing payment records for user {}", user.user_id);

    let now = Utc::now();
    let views: Vec<RecordView> = state
        .store
        .records_for_payer(user.user_id)
        .await?
        .into_iter()
        .map(|record| {
            let projection = ledger::project_record(&record.record, record.payment_request.due_date, now);
            RecordView { record, projection }
        })
        .filter(|view| !query.outstanding || view.projection.remaining_balance > Decimal::ZERO)
        .collect();

    Ok(ApiResponse::ok(views))
}
