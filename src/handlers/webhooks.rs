use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::webhook::{SIGNATURE_HEADER, StripeEvent, verify_signature};
use crate::state::AppState;

/// Processor callback. Takes the raw body since the signature covers the
/// exact bytes sent.
pub async fn stripe(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let settings = &state.settings.stripe;
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let now = Utc::now();
    verify_signature(
        &body,
        signature,
        &settings.webhook_secret,
        settings.webhook_tolerance_seconds,
        now.timestamp(),
    )
    .inspect_err(|e| warn!("Webhook rejected: {}", e))?;

    let event = StripeEvent::parse(&body)?;
    info!("Received webhook event {} ({})", event.id, event.event_type);

    let outcome = state.reconciler().handle(&event, now).await?;
    info!("Webhook event {} handled: {:?}", event.id, outcome);

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
