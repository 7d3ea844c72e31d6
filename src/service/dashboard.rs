//! Read-only overviews assembled from the ledgers. The current month is
//! taken from the state's clock.

use chrono::Datelike;
use serde::Serialize;
use utoipa::ToSchema;

use super::with_owners;
use crate::auth::gate::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{Attendance, AttendanceFilter, AttendanceSummary, SortOrder};
use crate::model::leave_request::{LeaveFilter, LeaveRequest, LeaveStatus};
use crate::model::role::Role;
use crate::model::user::{User, UserFilter, WithOwner};
use crate::state::AppState;
use crate::store::Page;
use crate::utils::dates::month_bounds;

const RECENT_LEAVES: usize = 5;
const PENDING_LEAVES: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveCounts {
    pub pending: u32,
    pub approved: u32,
    pub rejected: u32,
    pub cancelled: u32,
}

impl LeaveCounts {
    fn from_requests(requests: &[LeaveRequest]) -> Self {
        let mut counts = Self::default();
        for request in requests {
            match request.status {
                LeaveStatus::Pending => counts.pending += 1,
                LeaveStatus::Approved => counts.approved += 1,
                LeaveStatus::Rejected => counts.rejected += 1,
                LeaveStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub profile: User,
    pub month: u32,
    pub year: i32,
    pub attendance: AttendanceSummary,
    pub leave_counts: LeaveCounts,
    pub recent_leaves: Vec<LeaveRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_employees: u64,
    pub employees: Vec<User>,
    pub pending_leave_count: u64,
    #[schema(value_type = Vec<LeaveRequest>)]
    pub pending_leaves: Vec<WithOwner<LeaveRequest>>,
    pub month: u32,
    pub year: i32,
    pub attendance: AttendanceSummary,
}

async fn month_attendance(state: &AppState, user_id: Option<u64>) -> Result<(u32, i32, Vec<Attendance>), AppError> {
    let today = state.clock.now().date();
    let (first, last) = month_bounds(today.year(), today.month())
        .ok_or_else(|| AppError::Internal(format!("no month bounds for {today}")))?;
    let filter = AttendanceFilter {
        user_id,
        from: Some(first),
        to: Some(last),
        status: None,
    };
    let records = state
        .store
        .list_attendance(&filter, SortOrder::Ascending, None)
        .await?;
    Ok((today.month(), today.year(), records.items))
}

pub async fn employee(state: &AppState, caller: &AuthUser) -> Result<EmployeeDashboard, AppError> {
    let (month, year, records) = month_attendance(state, Some(caller.id())).await?;

    let filter = LeaveFilter {
        user_id: Some(caller.id()),
        ..Default::default()
    };
    let leaves = state.store.list_leaves(&filter, None).await?.items;

    Ok(EmployeeDashboard {
        profile: caller.user.clone(),
        month,
        year,
        attendance: AttendanceSummary::from_records(&records),
        leave_counts: LeaveCounts::from_requests(&leaves),
        recent_leaves: leaves.into_iter().take(RECENT_LEAVES).collect(),
    })
}

pub async fn admin(state: &AppState, caller: &AuthUser) -> Result<AdminDashboard, AppError> {
    caller.require_admin()?;

    let employees = state
        .store
        .list_users(
            &UserFilter {
                role: Some(Role::Employee),
                department: None,
            },
            Page::new(Some(1), Some(Page::MAX_LIMIT)),
        )
        .await?;

    let pending_filter = LeaveFilter {
        status: Some(LeaveStatus::Pending),
        ..Default::default()
    };
    let pending = state
        .store
        .list_leaves(&pending_filter, Some(Page::new(Some(1), Some(PENDING_LEAVES))))
        .await?;
    let pending_leaves = with_owners(state.store.as_ref(), pending.items, |r| r.user_id).await?;

    let (month, year, records) = month_attendance(state, None).await?;

    Ok(AdminDashboard {
        total_employees: employees.total,
        employees: employees.items,
        pending_leave_count: pending.total,
        pending_leaves,
        month,
        year,
        attendance: AttendanceSummary::from_records(&records),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::leave_request::LeaveType;
    use crate::service::attendance;
    use crate::service::leave::{self, LeaveApplication};
    use crate::service::test_support::{at, state, user};

    fn application(day: u32) -> LeaveApplication {
        LeaveApplication {
            leave_type: LeaveType::Sick,
            start_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            reason: "Unwell".into(),
        }
    }

    #[actix_web::test]
    async fn employee_view_covers_own_month_and_recent_leaves() {
        let clock = Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0)));
        let state = state(clock.clone());
        let me = user(&state, "E1", Role::Employee).await;
        let other = user(&state, "E2", Role::Employee).await;

        attendance::check_in(&state, &me).await.unwrap();
        clock.set(at(2024, 2, 2, 9, 0));
        attendance::check_in(&state, &me).await.unwrap();
        attendance::check_in(&state, &other).await.unwrap();

        for day in 1..=7 {
            leave::apply(&state, &me, application(day)).await.unwrap();
        }
        let first = leave::list(&state, &me, Default::default(), Page::new(None, None))
            .await
            .unwrap()
            .items
            .pop()
            .unwrap();
        leave::cancel(&state, &me, first.record.id).await.unwrap();

        let view = employee(&state, &me).await.unwrap();
        assert_eq!((view.month, view.year), (2, 2024));
        assert_eq!(view.attendance.present, 2);
        assert_eq!(view.leave_counts.pending, 6);
        assert_eq!(view.leave_counts.cancelled, 1);
        assert_eq!(view.recent_leaves.len(), 5);
    }

    #[actix_web::test]
    async fn admin_view_is_admin_only() {
        let state = state(Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0))));
        let admin_user = user(&state, "A1", Role::Admin).await;
        let manager = user(&state, "M1", Role::Manager).await;
        let me = user(&state, "E1", Role::Employee).await;
        user(&state, "E2", Role::Employee).await;
        leave::apply(&state, &me, application(4)).await.unwrap();
        attendance::check_in(&state, &me).await.unwrap();

        assert!(matches!(admin(&state, &manager).await.unwrap_err(), AppError::Forbidden(_)));

        let view = admin(&state, &admin_user).await.unwrap();
        assert_eq!(view.total_employees, 2);
        assert_eq!(view.pending_leave_count, 1);
        assert_eq!(
            view.pending_leaves[0].employee.as_ref().map(|e| e.id),
            Some(me.id())
        );
        assert_eq!(view.attendance.present, 1);
    }
}
