use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::payment_request::PaymentRequest;
use crate::requests::payment_request::CreatePaymentRequestRequest;
use crate::state::AppState;
use crate::utils::helpers::ApiResponse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPaymentRequest {
    request: PaymentRequest,
    record_count: usize,
}

pub async fn create(
    state: web::Data<AppState>,
    request: web::Json<CreatePaymentRequestRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    info!("User {} creating payment request for team {}", user.user_id, request.team_id);

    let created = state
        .billing()
        .create_request(request.into_inner().into_new(user.user_id))
        .await?;

    Ok(ApiResponse::created(CreatedPaymentRequest {
        request: created.request,
        record_count: created.record_count,
    }))
}

pub async fn apply_late_fees(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let request_id = path.into_inner();
    info!("User {} applying late fees for request {}", user.user_id, request_id);

    let applied = state
        .billing()
        .accrue_late_fees(user.user_id, request_id, Utc::now())
        .await?;

    Ok(ApiResponse::ok(json!({ "applied": applied })))
}
