use actix_web::{HttpResponse, web};
use tracing::{info, instrument};

use super::gate::AuthUser;
use crate::error::AppError;
use crate::response;
use crate::service::credentials::{self, LoginRequest, RegisterRequest};
use crate::state::AppState;

/// Creates an account and signs it in. The first account becomes admin.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = Session),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email or employee ID already exists"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let session = credentials::register(&state, body.into_inner()).await?;
    Ok(response::created("User registered successfully", session))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = Session),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login_handler", skip_all)]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let session = credentials::login(&state, body.into_inner()).await?;
    info!(user_id = session.user.id, "Login successful");
    Ok(response::ok("Login successful", session))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(response::ok("Profile retrieved", auth.user))
}
