use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use super::{
    AttendanceStore, LeaveStore, Page, Paged, PayrollStore, StoreError, StoreResult, UserStore,
};
use crate::model::attendance::{
    Attendance, AttendanceFilter, AttendanceStatus, NewAttendance, SortOrder,
};
use crate::model::leave_request::{
    LeaveFilter, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest, Review,
};
use crate::model::payroll::{
    NewPayroll, PayPeriod, Payment, Payroll, PayrollFilter, PayrollStatus, PayrollUpdate,
    SalaryComponents,
};
use crate::model::role::Role;
use crate::model::user::{
    JobDetails, NewUser, OwnerSummary, SalaryStructure, User, UserChanges, UserFilter,
};

/// Unique index name -> key name reported in conflicts.
const UNIQUE_KEYS: &[(&str, &str)] = &[
    ("uq_users_email", "Email"),
    ("uq_users_employee_id", "Employee ID"),
    ("uq_attendance_user_date", "Attendance for this date"),
    ("uq_payroll_user_period", "Payroll for this period"),
];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.code().as_deref() == Some("23000")
            && db_err.message().contains("Duplicate entry")
        {
            let key = UNIQUE_KEYS
                .iter()
                .find(|(index, _)| db_err.message().contains(index))
                .map(|(_, key)| key.to_string())
                .unwrap_or_else(|| "Record".to_string());
            return StoreError::Duplicate(key);
        }
        StoreError::Backend(err.to_string())
    }
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected {column} value '{value}' in database"))
}

/// Typed bind value for dynamically assembled statements.
#[derive(Debug, Clone)]
enum SqlArg {
    U64(u64),
    F64(f64),
    Str(String),
    OptStr(Option<String>),
    Date(NaiveDate),
    OptDate(Option<NaiveDate>),
    DateTime(NaiveDateTime),
}

macro_rules! bind_all {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                SqlArg::U64(v) => q.bind(*v),
                SqlArg::F64(v) => q.bind(*v),
                SqlArg::Str(v) => q.bind(v.clone()),
                SqlArg::OptStr(v) => q.bind(v.clone()),
                SqlArg::Date(v) => q.bind(*v),
                SqlArg::OptDate(v) => q.bind(*v),
                SqlArg::DateTime(v) => q.bind(*v),
            };
        }
        q
    }};
}

/// ` WHERE 1=1 AND ...` plus its arguments, in placeholder order.
struct Where {
    sql: String,
    args: Vec<SqlArg>,
}

impl Where {
    fn new() -> Self {
        Self {
            sql: String::from(" WHERE 1=1"),
            args: Vec::new(),
        }
    }

    fn and(&mut self, clause: &str, arg: SqlArg) {
        self.sql.push_str(" AND ");
        self.sql.push_str(clause);
        self.args.push(arg);
    }
}

fn limit_clause(page: Option<Page>) -> String {
    match page {
        Some(page) => format!(" LIMIT {} OFFSET {}", page.limit, page.offset()),
        None => String::new(),
    }
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    employee_id: Option<String>,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    phone: Option<String>,
    address: Option<String>,
    position: Option<String>,
    department: Option<String>,
    date_of_joining: Option<NaiveDate>,
    basic_salary: Option<f64>,
    allowances: f64,
    deductions: f64,
    profile_picture: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role).map_err(|_| corrupt("role", &row.role))?;
        Ok(User {
            id: row.id,
            employee_id: row.employee_id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            phone: row.phone,
            address: row.address,
            job_details: JobDetails {
                position: row.position,
                department: row.department,
                date_of_joining: row.date_of_joining,
            },
            salary_structure: SalaryStructure {
                basic_salary: row.basic_salary,
                allowances: row.allowances,
                deductions: row.deductions,
            },
            profile_picture: row.profile_picture,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, employee_id, name, email, password_hash, role, phone, address, \
     position, department, date_of_joining, basic_salary, allowances, deductions, \
     profile_picture, created_at, updated_at";

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    user_id: u64,
    date: NaiveDate,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    status: String,
    hours_worked: f64,
    remarks: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| corrupt("status", &row.status))?;
        Ok(Attendance {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status,
            hours_worked: row.hours_worked,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ATTENDANCE_COLUMNS: &str =
    "id, user_id, date, check_in, check_out, status, hours_worked, remarks, created_at, updated_at";

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    user_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    status: String,
    reviewed_by: Option<u64>,
    reviewed_at: Option<NaiveDateTime>,
    reviewer_note: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let leave_type =
            LeaveType::from_str(&row.leave_type).map_err(|_| corrupt("leave_type", &row.leave_type))?;
        let status = LeaveStatus::from_str(&row.status).map_err(|_| corrupt("status", &row.status))?;
        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            reviewer_note: row.reviewer_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LEAVE_COLUMNS: &str = "id, user_id, leave_type, start_date, end_date, reason, status, \
     reviewed_by, reviewed_at, reviewer_note, created_at, updated_at";

#[derive(FromRow)]
struct PayrollRow {
    id: u64,
    user_id: u64,
    period: String,
    basic_salary: f64,
    allowances: f64,
    bonuses: f64,
    deductions: f64,
    tax: f64,
    net_salary: f64,
    status: String,
    payment_date: Option<NaiveDate>,
    payment_method: Option<String>,
    generated_by: Option<u64>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<PayrollRow> for Payroll {
    type Error = StoreError;

    fn try_from(row: PayrollRow) -> Result<Self, Self::Error> {
        let period = PayPeriod::from_str(&row.period).map_err(|_| corrupt("period", &row.period))?;
        let status = PayrollStatus::from_str(&row.status).map_err(|_| corrupt("status", &row.status))?;
        Ok(Payroll {
            id: row.id,
            user_id: row.user_id,
            period,
            salary: SalaryComponents {
                basic_salary: row.basic_salary,
                allowances: row.allowances,
                bonuses: row.bonuses,
                deductions: row.deductions,
                tax: row.tax,
            },
            net_salary: row.net_salary,
            status,
            payment_date: row.payment_date,
            payment_method: row.payment_method,
            generated_by: row.generated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PAYROLL_COLUMNS: &str = "id, user_id, period, basic_salary, allowances, bonuses, deductions, \
     tax, net_salary, status, payment_date, payment_method, generated_by, created_at, updated_at";

fn convert<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// MySQL-backed store. Uniqueness and cascades live in the schema under
/// `migrations/`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn user_by(&self, column: &str, arg: SqlArg) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let row = bind_all!(sqlx::query_as::<_, UserRow>(&sql), [arg].iter())
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn attendance_by_id(&self, id: u64) -> StoreResult<Option<Attendance>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Attendance::try_from).transpose()
    }

    async fn count(&self, table: &str, filter: &Where) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}{}", filter.sql);
        let total = bind_all!(sqlx::query_scalar::<_, i64>(&sql), filter.args.iter())
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn count_users(&self) -> StoreResult<u64> {
        self.count("users", &Where::new()).await
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users
                (employee_id, name, email, password_hash, role, position, department,
                 date_of_joining, allowances, deductions, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            "#,
        )
        .bind(&user.employee_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .bind(&user.job_details.position)
        .bind(&user.job_details.department)
        .bind(user.job_details.date_of_joining)
        .bind(user.created_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        self.find_user(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::Backend("inserted user vanished".into()))
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        self.user_by("id", SqlArg::U64(id)).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.user_by("email", SqlArg::Str(email.to_string())).await
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<User>> {
        self.user_by("employee_id", SqlArg::Str(employee_id.to_string())).await
    }

    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<Paged<User>> {
        let mut w = Where::new();
        if let Some(role) = filter.role {
            w.and("role = ?", SqlArg::Str(role.to_string()));
        }
        if let Some(department) = &filter.department {
            w.and("department = ?", SqlArg::Str(department.clone()));
        }

        let total = self.count("users", &w).await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users{} ORDER BY created_at DESC, id DESC{}",
            w.sql,
            limit_clause(Some(page))
        );
        debug!(sql = %sql, "Listing users");
        let rows = bind_all!(sqlx::query_as::<_, UserRow>(&sql), w.args.iter())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged {
            items: convert(rows)?,
            total,
        })
    }

    async fn update_user(&self, id: u64, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<SqlArg> = Vec::new();
        let mut set = |column: &'static str, arg: SqlArg| {
            sets.push(column);
            args.push(arg);
        };

        if let Some(v) = &changes.employee_id {
            set("employee_id = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = &changes.name {
            set("name = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = &changes.phone {
            set("phone = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = &changes.address {
            set("address = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = &changes.position {
            set("position = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = &changes.department {
            set("department = ?", SqlArg::Str(v.clone()));
        }
        if let Some(v) = changes.date_of_joining {
            set("date_of_joining = ?", SqlArg::OptDate(Some(v)));
        }
        if let Some(v) = &changes.profile_picture {
            set("profile_picture = ?", SqlArg::OptStr(Some(v.clone())));
        }
        if let Some(s) = &changes.salary_structure {
            match s.basic_salary {
                Some(basic) => set("basic_salary = ?", SqlArg::F64(basic)),
                None => set("basic_salary = ?", SqlArg::OptStr(None)),
            }
            set("allowances = ?", SqlArg::F64(s.allowances));
            set("deductions = ?", SqlArg::F64(s.deductions));
        }
        if let Some(v) = changes.updated_at {
            set("updated_at = ?", SqlArg::DateTime(v));
        }

        if !sets.is_empty() {
            let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
            args.push(SqlArg::U64(id));
            bind_all!(sqlx::query(&sql), args.iter())
                .execute(&self.pool)
                .await?;
        }
        self.find_user(id).await
    }

    async fn update_role(&self, id: u64, role: Role, at: NaiveDateTime) -> StoreResult<Option<User>> {
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_ref())
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.find_user(id).await
    }

    async fn delete_user(&self, id: u64) -> StoreResult<bool> {
        // Ledger rows go with the user through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn owner_summaries(&self, ids: &[u64]) -> StoreResult<HashMap<u64, OwnerSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let users: Vec<User> = convert(query.fetch_all(&self.pool).await?)?;
        Ok(users.iter().map(|u| (u.id, OwnerSummary::from(u))).collect())
    }

    async fn all_emails(&self) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>("SELECT email FROM users")
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> StoreResult<Option<Attendance>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Attendance::try_from).transpose()
    }

    async fn insert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, date, check_in, check_out, status, hours_worked, remarks, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id)
        .bind(row.date)
        .bind(row.check_in)
        .bind(row.check_out)
        .bind(row.status.as_ref())
        .bind(row.hours_worked)
        .bind(&row.remarks)
        .bind(row.created_at)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        self.attendance_by_id(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::Backend("inserted attendance vanished".into()))
    }

    async fn set_check_in(&self, id: u64, at: NaiveDateTime) -> StoreResult<Option<Attendance>> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_in = ?, status = ?, updated_at = ?
            WHERE id = ? AND check_in IS NULL
            "#,
        )
        .bind(at)
        .bind(AttendanceStatus::Present.as_ref())
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.attendance_by_id(id).await
    }

    async fn set_check_out(&self, id: u64, at: NaiveDateTime, hours: f64) -> StoreResult<Option<Attendance>> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?, hours_worked = ?, updated_at = ?
            WHERE id = ? AND check_out IS NULL
            "#,
        )
        .bind(at)
        .bind(hours)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.attendance_by_id(id).await
    }

    async fn upsert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance> {
        sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, date, check_in, check_out, status, hours_worked, remarks, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                check_in = VALUES(check_in),
                check_out = VALUES(check_out),
                status = VALUES(status),
                hours_worked = VALUES(hours_worked),
                remarks = VALUES(remarks),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(row.user_id)
        .bind(row.date)
        .bind(row.check_in)
        .bind(row.check_out)
        .bind(row.status.as_ref())
        .bind(row.hours_worked)
        .bind(&row.remarks)
        .bind(row.created_at)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        self.find_attendance(row.user_id, row.date)
            .await?
            .ok_or_else(|| StoreError::Backend("upserted attendance vanished".into()))
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        order: SortOrder,
        page: Option<Page>,
    ) -> StoreResult<Paged<Attendance>> {
        let mut w = Where::new();
        if let Some(user_id) = filter.user_id {
            w.and("user_id = ?", SqlArg::U64(user_id));
        }
        if let Some(from) = filter.from {
            w.and("date >= ?", SqlArg::Date(from));
        }
        if let Some(to) = filter.to {
            w.and("date <= ?", SqlArg::Date(to));
        }
        if let Some(status) = filter.status {
            w.and("status = ?", SqlArg::Str(status.to_string()));
        }

        let total = self.count("attendance", &w).await?;
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance{} ORDER BY date {direction}, id {direction}{}",
            w.sql,
            limit_clause(page)
        );
        let rows = bind_all!(sqlx::query_as::<_, AttendanceRow>(&sql), w.args.iter())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged {
            items: convert(rows)?,
            total,
        })
    }
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn insert_leave(&self, row: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, leave_type, start_date, end_date, reason, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id)
        .bind(row.leave_type.as_ref())
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(&row.reason)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(row.created_at)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        self.find_leave(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::Backend("inserted leave request vanished".into()))
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }

    async fn find_overlapping_leave(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!(
            r#"
            SELECT {LEAVE_COLUMNS} FROM leave_requests
            WHERE user_id = ?
              AND status IN (?, ?)
              AND (
                    (start_date >= ? AND start_date <= ?)
                 OR (end_date >= ? AND end_date <= ?)
                 OR (start_date <= ? AND end_date >= ?)
              )
            ORDER BY start_date
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(user_id)
            .bind(LeaveStatus::Pending.as_ref())
            .bind(LeaveStatus::Approved.as_ref())
            .bind(start)
            .bind(end)
            .bind(start)
            .bind(end)
            .bind(start)
            .bind(end)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }

    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        review: Option<Review>,
        at: NaiveDateTime,
    ) -> StoreResult<Option<LeaveRequest>> {
        let result = match review {
            Some(review) => {
                sqlx::query(
                    r#"
                    UPDATE leave_requests
                    SET status = ?, reviewed_by = ?, reviewed_at = ?,
                        reviewer_note = COALESCE(?, reviewer_note), updated_at = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(to.as_ref())
                .bind(review.reviewer_id)
                .bind(review.reviewed_at)
                .bind(review.note)
                .bind(at)
                .bind(id)
                .bind(from.as_ref())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("UPDATE leave_requests SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                    .bind(to.as_ref())
                    .bind(at)
                    .bind(id)
                    .bind(from.as_ref())
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_leave(id).await
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Paged<LeaveRequest>> {
        let mut w = Where::new();
        if let Some(user_id) = filter.user_id {
            w.and("user_id = ?", SqlArg::U64(user_id));
        }
        if let Some(status) = filter.status {
            w.and("status = ?", SqlArg::Str(status.to_string()));
        }
        if let Some(leave_type) = filter.leave_type {
            w.and("leave_type = ?", SqlArg::Str(leave_type.to_string()));
        }

        let total = self.count("leave_requests", &w).await?;
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests{} ORDER BY created_at DESC, id DESC{}",
            w.sql,
            limit_clause(page)
        );
        let rows = bind_all!(sqlx::query_as::<_, LeaveRow>(&sql), w.args.iter())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged {
            items: convert(rows)?,
            total,
        })
    }

    async fn approved_leaves_in_year(&self, user_id: u64, year: i32) -> StoreResult<Vec<LeaveRequest>> {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests \
             WHERE user_id = ? AND status = ? AND start_date <= ? AND end_date >= ?"
        );
        let rows = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(user_id)
            .bind(LeaveStatus::Approved.as_ref())
            .bind(last)
            .bind(first)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }
}

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn insert_payroll(&self, row: NewPayroll) -> StoreResult<Payroll> {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll
                (user_id, period, basic_salary, allowances, bonuses, deductions, tax,
                 net_salary, status, generated_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id)
        .bind(row.period.to_string())
        .bind(row.salary.basic_salary)
        .bind(row.salary.allowances)
        .bind(row.salary.bonuses)
        .bind(row.salary.deductions)
        .bind(row.salary.tax)
        .bind(row.net_salary())
        .bind(PayrollStatus::Processing.as_ref())
        .bind(row.generated_by)
        .bind(row.created_at)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        self.find_payroll(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::Backend("inserted payroll vanished".into()))
    }

    async fn find_payroll(&self, id: u64) -> StoreResult<Option<Payroll>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?");
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payroll::try_from).transpose()
    }

    async fn find_payroll_for_period(&self, user_id: u64, period: PayPeriod) -> StoreResult<Option<Payroll>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE user_id = ? AND period = ?");
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(user_id)
            .bind(period.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payroll::try_from).transpose()
    }

    async fn update_payroll(&self, id: u64, update: &PayrollUpdate) -> StoreResult<Option<Payroll>> {
        let result = sqlx::query(
            r#"
            UPDATE payroll
            SET basic_salary = ?, allowances = ?, bonuses = ?, deductions = ?, tax = ?,
                net_salary = ?, status = ?, payment_method = ?, updated_at = ?
            WHERE id = ? AND status <> ?
            "#,
        )
        .bind(update.salary.basic_salary)
        .bind(update.salary.allowances)
        .bind(update.salary.bonuses)
        .bind(update.salary.deductions)
        .bind(update.salary.tax)
        .bind(update.net_salary)
        .bind(update.status.as_ref())
        .bind(&update.payment_method)
        .bind(update.updated_at)
        .bind(id)
        .bind(PayrollStatus::Paid.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_payroll(id).await
    }

    async fn mark_paid(&self, id: u64, payment: &Payment) -> StoreResult<Option<Payroll>> {
        let result = sqlx::query(
            r#"
            UPDATE payroll
            SET status = ?, payment_date = ?, payment_method = ?, updated_at = ?
            WHERE id = ? AND status <> ?
            "#,
        )
        .bind(PayrollStatus::Paid.as_ref())
        .bind(payment.payment_date)
        .bind(&payment.payment_method)
        .bind(payment.updated_at)
        .bind(id)
        .bind(PayrollStatus::Paid.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_payroll(id).await
    }

    async fn list_payrolls(&self, filter: &PayrollFilter, page: Option<Page>) -> StoreResult<Paged<Payroll>> {
        let mut w = Where::new();
        if let Some(user_id) = filter.user_id {
            w.and("user_id = ?", SqlArg::U64(user_id));
        }
        if let Some(period) = filter.period {
            w.and("period = ?", SqlArg::Str(period.to_string()));
        }
        if let Some(status) = filter.status {
            w.and("status = ?", SqlArg::Str(status.to_string()));
        }

        let total = self.count("payroll", &w).await?;
        let sql = format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll{} ORDER BY period DESC, created_at DESC, id DESC{}",
            w.sql,
            limit_clause(page)
        );
        let rows = bind_all!(sqlx::query_as::<_, PayrollRow>(&sql), w.args.iter())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged {
            items: convert(rows)?,
            total,
        })
    }
}
