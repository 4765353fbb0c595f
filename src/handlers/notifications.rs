use actix_web::{HttpResponse, web};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthenticatedUser;
use crate::state::AppState;
use crate::utils::helpers::ApiResponse;

const UNREAD_LIMIT: i64 = 10;

pub async fn index(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse, ApiError> {
    let notifications = state
        .store
        .unread_notifications(user.user_id, UNREAD_LIMIT)
        .await?;

    Ok(ApiResponse::ok(notifications))
}

pub async fn mark_read(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !state.store.mark_notification_read(id, user.user_id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(ApiResponse::ok(json!({ "id": id, "read": true })))
}
