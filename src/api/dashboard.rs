use actix_web::{HttpResponse, web};

use crate::auth::gate::AuthUser;
use crate::error::AppError;
use crate::response;
use crate::service::dashboard;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/dashboard/employee",
    responses(
        (status = 200, description = "Own profile, this month's attendance and recent leave", body = EmployeeDashboard),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn employee(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let view = dashboard::employee(&state, &auth).await?;
    Ok(response::ok("Dashboard data retrieved", view))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/admin",
    responses(
        (status = 200, description = "Headcount, pending leave and this month's attendance", body = AdminDashboard),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn admin(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let view = dashboard::admin(&state, &auth).await?;
    Ok(response::ok("Admin dashboard data retrieved", view))
}
