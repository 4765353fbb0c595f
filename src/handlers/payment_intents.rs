use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::requests::payment_intent::CreatePaymentIntentRequest;
use crate::state::AppState;

pub async fn create(
    state: web::Data<AppState>,
    request: web::Json<CreatePaymentIntentRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    let (Some(record_id), Some(amount)) = (request.payment_record_id, request.amount) else {
        return Err(ApiError::invalid_input("Missing required fields"));
    };
    info!("Creating payment intent for record {} by user {}", record_id, user.user_id);

    let issued = state
        .issuer()
        .issue(user.user_id, record_id, amount, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(issued))
}
