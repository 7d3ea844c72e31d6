use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::gate::{AuthUser, TargetUser};
use crate::error::AppError;
use crate::model::leave_request::{LeaveStatus, LeaveType};
use crate::response;
use crate::service::leave::{self, LeaveApplication, LeaveQuery, StatusUpdate};
use crate::state::AppState;
use crate::store::Page;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveListQuery {
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 10)]
    pub limit: Option<u32>,
    pub user_id: Option<u64>,
    pub employee_id: Option<String>,
    pub status: Option<LeaveStatus>,
    pub leave_type: Option<LeaveType>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    #[param(example = 2024)]
    pub year: Option<i32>,
    pub user_id: Option<u64>,
    pub employee_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/leave/apply",
    request_body = LeaveApplication,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Overlaps an existing request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<LeaveApplication>,
) -> Result<HttpResponse, AppError> {
    let request = leave::apply(&state, &auth, body.into_inner()).await?;
    Ok(response::created("Leave request submitted successfully", request))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveListQuery),
    responses(
        (status = 200, description = "Paginated leave requests, newest first", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<LeaveListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = Page::new(query.page, query.limit);
    let filter = LeaveQuery {
        target: TargetUser {
            user_id: query.user_id,
            employee_id: query.employee_id,
        },
        status: query.status,
        leave_type: query.leave_type,
    };
    let requests = leave::list(&state, &auth, filter, page).await?;
    Ok(response::paginated("Leave requests retrieved", page, requests))
}

#[utoipa::path(
    get,
    path = "/api/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Allotted, used and remaining days per type", body = LeaveBalance),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn balance(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let target = TargetUser {
        user_id: query.user_id,
        employee_id: query.employee_id,
    };
    let balance = leave::balance(&state, &auth, target, query.year).await?;
    Ok(response::ok("Leave balance retrieved", balance))
}

#[utoipa::path(
    get,
    path = "/api/leave/types",
    responses(
        (status = 200, description = "Leave types and annual allotments", body = [LeaveTypeInfo])
    ),
    tag = "Leave"
)]
pub async fn types() -> Result<HttpResponse, AppError> {
    Ok(response::ok("Leave types retrieved", leave::leave_types()))
}

#[utoipa::path(
    get,
    path = "/api/leave/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request with owner", body = LeaveRequest),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = leave::get(&state, &auth, path.into_inner()).await?;
    Ok(response::ok("Leave request retrieved", request))
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/status",
    params(("id" = u64, Path, description = "Leave request ID")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Request approved or rejected", body = LeaveRequest),
        (status = 400, description = "Invalid status or request no longer pending"),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    let request = leave::update_status(&state, &auth, path.into_inner(), body.into_inner()).await?;
    let message = format!("Leave request {}", request.status.to_string().to_lowercase());
    Ok(response::ok(&message, request))
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/cancel",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Request cancelled", body = LeaveRequest),
        (status = 400, description = "Only pending requests can be cancelled"),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = leave::cancel(&state, &auth, path.into_inner()).await?;
    Ok(response::ok("Leave request cancelled", request))
}
