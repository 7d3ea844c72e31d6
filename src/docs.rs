use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::auth::gate::TargetUser;
use crate::error::FieldError;
use crate::model::attendance::{Attendance, AttendanceStatus, AttendanceSummary};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{Payroll, PayrollStatus, PayrollSummary, SalaryComponents};
use crate::model::role::Role;
use crate::model::user::{JobDetails, OwnerSummary, SalaryStructure, User};
use crate::service::attendance::{MarkAttendance, MonthlyReport, WeeklyAttendance};
use crate::service::credentials::{LoginRequest, RegisterRequest, Session};
use crate::service::dashboard::{AdminDashboard, EmployeeDashboard, LeaveCounts};
use crate::service::leave::{LeaveApplication, LeaveBalance, LeaveTypeInfo, StatusUpdate, TypeBalance};
use crate::service::payroll::{EmployeePayrollSummary, GeneratePayroll, PaymentRequest, PayrollChanges};
use crate::service::users::{ProfileUpdate, RoleUpdate, UserUpdate};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "1.0.0",
        description = r#"
## Human Resource Management (HRM) System

Accounts, attendance, leave and payroll for one organization.

### Key Features
- **Accounts**: registration, login, profiles, role management
- **Attendance**: daily check-in/check-out, manual marking, weekly and monthly views
- **Leave**: applications with overlap protection, review, cancellation, yearly balances
- **Payroll**: per-period records with server-computed net salary, payment, summaries

### Security
Protected endpoints take a **JWT Bearer** token from `/api/auth/login`.
Employees see only their own records; managers and admins see everyone's.
User administration and the admin dashboard are admin-only.

### Response Format
Every response is `{ success, message, data }`; failures carry `errors`
instead of `data`, and list endpoints add `page`, `limit`, `total` and `pages`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::user::get_profile,
        crate::api::user::update_profile,
        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::update_role,
        crate::api::user::delete_user,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::mark,
        crate::api::attendance::list,
        crate::api::attendance::weekly,
        crate::api::attendance::report,

        crate::api::leave_request::apply,
        crate::api::leave_request::list,
        crate::api::leave_request::balance,
        crate::api::leave_request::types,
        crate::api::leave_request::get,
        crate::api::leave_request::update_status,
        crate::api::leave_request::cancel,

        crate::api::payroll::generate,
        crate::api::payroll::list,
        crate::api::payroll::summary,
        crate::api::payroll::get,
        crate::api::payroll::update,
        crate::api::payroll::pay,

        crate::api::dashboard::employee,
        crate::api::dashboard::admin
    ),
    components(
        schemas(
            FieldError,
            Role,
            User,
            JobDetails,
            SalaryStructure,
            OwnerSummary,
            TargetUser,
            RegisterRequest,
            LoginRequest,
            Session,
            ProfileUpdate,
            UserUpdate,
            RoleUpdate,
            Attendance,
            AttendanceStatus,
            AttendanceSummary,
            MarkAttendance,
            WeeklyAttendance,
            MonthlyReport,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            LeaveApplication,
            StatusUpdate,
            LeaveTypeInfo,
            LeaveBalance,
            TypeBalance,
            Payroll,
            PayrollStatus,
            SalaryComponents,
            PayrollSummary,
            GeneratePayroll,
            PayrollChanges,
            PaymentRequest,
            EmployeePayrollSummary,
            LeaveCounts,
            EmployeeDashboard,
            AdminDashboard
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Profiles and user administration"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Dashboard", description = "Overviews"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
