use actix_web::http::header::{AUTHORIZATION, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::debug;

use super::gate::AuthUser;
use super::jwt::verify_token;
use crate::error::AppError;
use crate::state::AppState;

/// Bearer token -> verified claims -> current user row.
///
/// The user is re-read on every request so role changes and deletions
/// apply immediately, even to tokens issued earlier.
pub async fn authenticate(state: &AppState, header: Option<&HeaderValue>) -> Result<AuthUser, AppError> {
    let header_value = header
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".into()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authorization header must start with Bearer".into()))?;

    let claims = verify_token(token, &state.config.jwt_secret).map_err(|e| {
        debug!(error = %e, "Token rejected");
        AppError::Unauthorized("Not authorized, token failed".into())
    })?;

    let user = state
        .store
        .find_user(claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authorized, user not found".into()))?;

    Ok(AuthUser { user })
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let state = req
        .app_data::<Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("App state missing".into()))?;

    let auth_user = authenticate(&state, req.headers().get(AUTHORIZATION)).await?;
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
