use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::gate::{AuthUser, TargetUser};
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::response;
use crate::service::attendance::{self, AttendanceQuery, MarkAttendance};
use crate::state::AppState;
use crate::store::Page;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceListQuery {
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 10)]
    pub limit: Option<u32>,
    /// Ignored for non-privileged callers.
    pub user_id: Option<u64>,
    #[param(example = "E100")]
    pub employee_id: Option<String>,
    #[serde(alias = "startDate")]
    pub from: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WeeklyQuery {
    /// Defaults to the Sunday of the current week.
    pub week_start: Option<NaiveDate>,
    pub user_id: Option<u64>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    #[param(example = 3)]
    pub month: Option<u32>,
    #[param(example = 2024)]
    pub year: Option<i32>,
    pub user_id: Option<u64>,
    pub employee_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    responses(
        (status = 201, description = "Checked in", body = Attendance),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let record = attendance::check_in(&state, &auth).await?;
    Ok(response::created("Checked in successfully", record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = Attendance),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No check-in record found for today"),
        (status = 409, description = "Already checked out today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let record = attendance::check_out(&state, &auth).await?;
    Ok(response::ok("Checked out successfully", record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/mark",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Attendance recorded", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Manager or admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<MarkAttendance>,
) -> Result<HttpResponse, AppError> {
    let record = attendance::mark(&state, &auth, body.into_inner()).await?;
    Ok(response::ok("Attendance marked successfully", record))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "Paginated attendance, newest first", body = [Attendance]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<AttendanceListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = Page::new(query.page, query.limit);
    let filter = AttendanceQuery {
        target: TargetUser {
            user_id: query.user_id,
            employee_id: query.employee_id,
        },
        from: query.from,
        to: query.to,
        status: query.status,
    };
    let records = attendance::list(&state, &auth, filter, page).await?;
    Ok(response::paginated("Attendance records retrieved", page, records))
}

#[utoipa::path(
    get,
    path = "/api/attendance/weekly",
    params(WeeklyQuery),
    responses(
        (status = 200, description = "Seven days of attendance, oldest first", body = WeeklyAttendance),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn weekly(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<WeeklyQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let target = TargetUser {
        user_id: query.user_id,
        employee_id: query.employee_id,
    };
    let week = attendance::weekly(&state, &auth, query.week_start, target).await?;
    Ok(response::ok("Weekly attendance retrieved", week))
}

#[utoipa::path(
    get,
    path = "/api/attendance/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Monthly counts per status", body = MonthlyReport),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn report(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let target = TargetUser {
        user_id: query.user_id,
        employee_id: query.employee_id,
    };
    let report = attendance::monthly_report(&state, &auth, target, query.month, query.year).await?;
    Ok(response::ok("Monthly report generated", report))
}
