use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::auth::{AuthenticatedUser, ServiceCaller};
use crate::models::push_subscription::NewPushSubscription;
use crate::requests::push::{SendPushRequest, SubscribeRequest, UnsubscribeRequest};
use crate::state::AppState;
use crate::utils::helpers::ApiResponse;

pub async fn send(
    state: web::Data<AppState>,
    request: web::Json<SendPushRequest>,
    _caller: ServiceCaller,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    let (Some(user_id), Some(title), Some(message)) = (
        request.user_id,
        request.title.filter(|t| !t.is_empty()),
        request.message.filter(|m| !m.is_empty()),
    ) else {
        return Err(ApiError::invalid_input("Missing required fields"));
    };

    let report = state
        .push()
        .deliver_to_user(user_id, &title, &message, request.kind.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "sent": report.sent,
        "total": report.total,
    })))
}

pub async fn subscribe(
    state: web::Data<AppState>,
    request: web::Json<SubscribeRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    if request.endpoint.is_empty() || request.keys.p256dh.is_empty() || request.keys.auth.is_empty() {
        return Err(ApiError::invalid_input("Missing required fields"));
    }
    info!("Registering push subscription for user {}", user.user_id);

    let subscription = state
        .store
        .upsert_push_subscription(NewPushSubscription {
            user_id: user.user_id,
            endpoint: request.endpoint,
            p256dh_key: request.keys.p256dh,
            auth_key: request.keys.auth,
        })
        .await?;

    Ok(ApiResponse::ok(subscription))
}

pub async fn unsubscribe(
    state: web::Data<AppState>,
    request: web::Json<UnsubscribeRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    info!("Removing push subscription for user {}", user.user_id);

    let removed = state
        .store
        .remove_push_subscription(user.user_id, &request.endpoint)
        .await?;

    Ok(ApiResponse::ok(json!({ "removed": removed })))
}
