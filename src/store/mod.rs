//! Persistence seam. Each ledger has its own trait; `Store` bundles them so
//! handlers can hold a single `Arc<dyn Store>`.
//!
//! Natural keys are enforced here, not by callers: a second insert for the
//! same email, employee id, (user, date) or (user, period) fails with
//! [`StoreError::Duplicate`]. Status transitions are conditional updates
//! that report whether the row was in the expected state.

pub mod memory;
pub mod mysql;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;

use crate::model::attendance::{Attendance, AttendanceFilter, NewAttendance, SortOrder};
use crate::model::leave_request::{LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest, Review};
use crate::model::payroll::{NewPayroll, PayPeriod, Payment, Payroll, PayrollFilter, PayrollUpdate};
use crate::model::role::Role;
use crate::model::user::{NewUser, OwnerSummary, User, UserChanges, UserFilter};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum StoreError {
    /// A unique key collided; carries the human-facing key name.
    #[display(fmt = "duplicate {}", _0)]
    Duplicate(String),
    #[display(fmt = "store backend error: {}", _0)]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based page with a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn count_users(&self) -> StoreResult<u64>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: u64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<Paged<User>>;
    async fn update_user(&self, id: u64, changes: &UserChanges) -> StoreResult<Option<User>>;
    async fn update_role(&self, id: u64, role: Role, at: NaiveDateTime) -> StoreResult<Option<User>>;
    /// Removes the user and every ledger row they own.
    async fn delete_user(&self, id: u64) -> StoreResult<bool>;
    async fn owner_summaries(&self, ids: &[u64]) -> StoreResult<HashMap<u64, OwnerSummary>>;
    async fn all_emails(&self) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> StoreResult<Option<Attendance>>;
    async fn insert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance>;
    /// Sets check-in and status=Present only when check-in is still unset.
    async fn set_check_in(&self, id: u64, at: NaiveDateTime) -> StoreResult<Option<Attendance>>;
    /// Sets check-out and hours only when check-out is still unset.
    async fn set_check_out(&self, id: u64, at: NaiveDateTime, hours: f64) -> StoreResult<Option<Attendance>>;
    /// Insert-or-overwrite keyed on (user, date).
    async fn upsert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance>;
    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        order: SortOrder,
        page: Option<Page>,
    ) -> StoreResult<Paged<Attendance>>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert_leave(&self, row: NewLeaveRequest) -> StoreResult<LeaveRequest>;
    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    /// First Pending/Approved request of `user_id` sharing a day with `[start, end]`.
    async fn find_overlapping_leave(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>>;
    /// Moves the request to `to` only if it is currently `from`.
    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        review: Option<Review>,
        at: NaiveDateTime,
    ) -> StoreResult<Option<LeaveRequest>>;
    /// Newest first.
    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Paged<LeaveRequest>>;
    /// Approved requests of `user_id` touching the given calendar year.
    async fn approved_leaves_in_year(&self, user_id: u64, year: i32) -> StoreResult<Vec<LeaveRequest>>;
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn insert_payroll(&self, row: NewPayroll) -> StoreResult<Payroll>;
    async fn find_payroll(&self, id: u64) -> StoreResult<Option<Payroll>>;
    async fn find_payroll_for_period(&self, user_id: u64, period: PayPeriod) -> StoreResult<Option<Payroll>>;
    /// Rewrites amounts and status unless the record is already Paid.
    async fn update_payroll(&self, id: u64, update: &PayrollUpdate) -> StoreResult<Option<Payroll>>;
    /// Marks the record Paid unless it already is.
    async fn mark_paid(&self, id: u64, payment: &Payment) -> StoreResult<Option<Payroll>>;
    /// Newest period first.
    async fn list_payrolls(&self, filter: &PayrollFilter, page: Option<Page>) -> StoreResult<Paged<Payroll>>;
}

pub trait Store: UserStore + AttendanceStore + LeaveStore + PayrollStore {}

impl<T: UserStore + AttendanceStore + LeaveStore + PayrollStore> Store for T {}
