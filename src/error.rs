use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;
use tracing::error;

use crate::database::store::StoreError;
use crate::services::push::PushError;
use crate::services::webhook::WebhookError;
use crate::utils::helpers::ApiResponse;

/// Failure taxonomy surfaced to API callers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid identity token.
    #[error("{0}")]
    Unauthenticated(String),
    /// Authenticated, but lacking the team role or ownership required.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    /// The card processor or a delivery endpoint failed.
    #[error("{0}")]
    UpstreamFailure(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!("Store error: {}", e);
        ApiError::Internal(e.to_string())
    }
}

impl From<WebhookError> for ApiError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::Store(inner) => inner.into(),
            WebhookError::MissingSecret => ApiError::Internal(e.to_string()),
            other => ApiError::InvalidInput(other.to_string()),
        }
    }
}

impl From<PushError> for ApiError {
    fn from(e: PushError) -> Self {
        match e {
            PushError::Store(inner) => inner.into(),
            other => {
                error!("Push error: {}", other);
                ApiError::UpstreamFailure(other.to_string())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal details stay in the logs.
        let message = match self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ApiResponse::<()>::error(message).to_response(self.status_code())
    }
}
