use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::requests::blast::BlastRequest;
use crate::state::AppState;

pub async fn send(
    state: web::Data<AppState>,
    request: web::Json<BlastRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    let (Some(team_id), Some(subject), Some(message)) = (
        request.team_id,
        request.subject.filter(|s| !s.trim().is_empty()),
        request.message.filter(|m| !m.trim().is_empty()),
    ) else {
        return Err(ApiError::invalid_input("Missing required fields"));
    };
    info!("User {} sending blast to team {}", user.user_id, team_id);

    let receipt = state
        .blasts()
        .send(user.user_id, team_id, &subject, &message)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "messageId": receipt.message_id,
        "recipientCount": receipt.recipient_count,
    })))
}
