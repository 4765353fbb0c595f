use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures_util::future::{Ready, ready};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::utils::helpers::bearer_token;

/// Caller identified by a valid bearer token from the identity provider.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Internal caller presenting the configured service token.
#[derive(Debug, Clone, Copy)]
pub struct ServiceCaller;

fn app_state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        error!("AppState is not registered");
        ApiError::Internal("application state missing".to_string())
    })
}

fn authorization(req: &HttpRequest) -> Result<&str, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if header.is_none() {
        return Err(ApiError::Unauthenticated("No authorization header".to_string()));
    }
    bearer_token(header).ok_or_else(|| ApiError::Unauthenticated("Malformed authorization header".to_string()))
}

impl AuthenticatedUser {
    fn extract(req: &HttpRequest) -> Result<Self, ApiError> {
        let state = app_state(req)?;
        let token = authorization(req)?;

        let claims = state.auth.validate_token(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::Unauthenticated("Unauthorized".to_string())
        })?;

        Ok(AuthenticatedUser { user_id: claims.sub })
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(AuthenticatedUser::extract(req))
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

impl ServiceCaller {
    fn extract(req: &HttpRequest) -> Result<Self, ApiError> {
        let state = app_state(req)?;
        let token = authorization(req)?;
        let expected = &state.settings.auth.service_token;

        if expected.is_empty() || !tokens_match(token, expected) {
            warn!("Rejected service call with unknown token");
            return Err(ApiError::Unauthenticated("Unauthorized".to_string()));
        }
        Ok(ServiceCaller)
    }
}

impl FromRequest for ServiceCaller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(ServiceCaller::extract(req))
    }
}
