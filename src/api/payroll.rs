use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::gate::{AuthUser, TargetUser};
use crate::error::AppError;
use crate::model::payroll::{PayPeriod, PayrollStatus};
use crate::response;
use crate::service::payroll::{self, GeneratePayroll, PaymentRequest, PayrollChanges, PayrollQuery};
use crate::state::AppState;
use crate::store::Page;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PayrollListQuery {
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 10)]
    pub limit: Option<u32>,
    pub user_id: Option<u64>,
    #[param(example = "E100")]
    pub employee_id: Option<String>,
    #[param(value_type = Option<String>, example = "2024-01")]
    pub period: Option<PayPeriod>,
    pub status: Option<PayrollStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    pub user_id: Option<u64>,
    pub employee_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = GeneratePayroll,
    responses(
        (status = 201, description = "Payroll generated", body = Payroll),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll already exists for this employee and period")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<GeneratePayroll>,
) -> Result<HttpResponse, AppError> {
    let payroll = payroll::generate(&state, &auth, body.into_inner()).await?;
    Ok(response::created("Payroll generated successfully", payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollListQuery),
    responses(
        (status = 200, description = "Paginated payroll, newest period first", body = [Payroll]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PayrollListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = Page::new(query.page, query.limit);
    let filter = PayrollQuery {
        target: TargetUser {
            user_id: query.user_id,
            employee_id: query.employee_id,
        },
        period: query.period,
        status: query.status,
    };
    let records = payroll::list(&state, &auth, filter, page).await?;
    Ok(response::paginated("Payroll records retrieved", page, records))
}

#[utoipa::path(
    get,
    path = "/api/payroll/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Totals across the employee's payroll", body = EmployeePayrollSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let target = TargetUser {
        user_id: query.user_id,
        employee_id: query.employee_id,
    };
    let summary = payroll::summary(&state, &auth, target).await?;
    Ok(response::ok("Payroll summary retrieved", summary))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll record with owner", body = Payroll),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let record = payroll::get(&state, &auth, path.into_inner()).await?;
    Ok(response::ok("Payroll record retrieved", record))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll ID")),
    request_body = PayrollChanges,
    responses(
        (status = 200, description = "Payroll updated, net salary recomputed", body = Payroll),
        (status = 400, description = "Validation failed or record already paid"),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<PayrollChanges>,
) -> Result<HttpResponse, AppError> {
    let record = payroll::update(&state, &auth, path.into_inner(), body.into_inner()).await?;
    Ok(response::ok("Payroll updated successfully", record))
}

/// The body is optional; an empty request pays today with the default method.
#[utoipa::path(
    put,
    path = "/api/payroll/{id}/pay",
    params(("id" = u64, Path, description = "Payroll ID")),
    request_body(content = PaymentRequest, description = "Optional payment date and method"),
    responses(
        (status = 200, description = "Payroll marked as paid", body = Payroll),
        (status = 400, description = "Payroll has already been paid"),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn pay(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: Option<web::Json<PaymentRequest>>,
) -> Result<HttpResponse, AppError> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let record = payroll::pay(&state, &auth, path.into_inner(), request).await?;
    Ok(response::ok("Payment processed successfully", record))
}
