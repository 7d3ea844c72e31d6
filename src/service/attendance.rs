use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{invalid, with_owners};
use crate::auth::gate::{AuthUser, TargetUser, listing_scope, resolve_target, subject_user};
use crate::error::AppError;
use crate::model::attendance::{
    Attendance, AttendanceFilter, AttendanceStatus, AttendanceSummary, NewAttendance, SortOrder,
    hours_between,
};
use crate::model::user::{OwnerSummary, WithOwner};
use crate::state::AppState;
use crate::store::{Page, Paged, StoreError};
use crate::utils::dates::{month_bounds, week_bounds, week_start};

/// Privileged backfill or correction of one (user, day) row.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_mark_times"))]
pub struct MarkAttendance {
    #[serde(flatten)]
    pub target: TargetUser,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    #[validate(range(min = 0.0, max = 24.0, message = "Hours worked must be between 0 and 24"))]
    pub hours_worked: Option<f64>,
    #[validate(length(max = 200, message = "Remarks cannot exceed 200 characters"))]
    pub remarks: Option<String>,
}

fn validate_mark_times(mark: &MarkAttendance) -> Result<(), ValidationError> {
    match (mark.check_in, mark.check_out) {
        (Some(check_in), Some(check_out)) if check_out < check_in => Err(invalid(
            "check_out_before_check_in",
            "Check-out time must be after check-in time",
        )),
        (None, Some(_)) => Err(invalid("check_out_without_check_in", "Check-out requires a check-in time")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
    pub target: TargetUser,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAttendance {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[schema(value_type = Vec<Attendance>)]
    pub records: Vec<WithOwner<Attendance>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub employee: OwnerSummary,
    pub month: u32,
    pub year: i32,
    pub summary: AttendanceSummary,
    pub records: Vec<Attendance>,
}

fn already_checked_in() -> AppError {
    AppError::Conflict("You have already checked in today".into())
}

fn already_checked_out() -> AppError {
    AppError::Conflict("You have already checked out today".into())
}

/// Opens today's row, or fills the check-in of a row created by `mark`.
pub async fn check_in(state: &AppState, caller: &AuthUser) -> Result<Attendance, AppError> {
    let now = state.clock.now();
    let today = now.date();

    let record = match state.store.find_attendance(caller.id(), today).await? {
        Some(existing) if existing.check_in.is_some() => return Err(already_checked_in()),
        Some(existing) => state
            .store
            .set_check_in(existing.id, now)
            .await?
            .ok_or_else(already_checked_in)?,
        None => state
            .store
            .insert_attendance(NewAttendance {
                user_id: caller.id(),
                date: today,
                check_in: Some(now),
                check_out: None,
                status: AttendanceStatus::Present,
                hours_worked: 0.0,
                remarks: None,
                created_at: now,
            })
            .await
            .map_err(|e| match e {
                // lost the race against a concurrent check-in
                StoreError::Duplicate(_) => already_checked_in(),
                other => other.into(),
            })?,
    };

    info!(user_id = caller.id(), date = %today, "Checked in");
    Ok(record)
}

pub async fn check_out(state: &AppState, caller: &AuthUser) -> Result<Attendance, AppError> {
    let now = state.clock.now();
    let today = now.date();
    let no_check_in = || AppError::NotFound("No check-in record found for today".into());

    let existing = state
        .store
        .find_attendance(caller.id(), today)
        .await?
        .ok_or_else(no_check_in)?;
    let checked_in_at = existing.check_in.ok_or_else(no_check_in)?;
    if existing.check_out.is_some() {
        return Err(already_checked_out());
    }

    let hours = hours_between(checked_in_at, now);
    let record = state
        .store
        .set_check_out(existing.id, now, hours)
        .await?
        .ok_or_else(already_checked_out)?;

    info!(user_id = caller.id(), date = %today, hours, "Checked out");
    Ok(record)
}

pub async fn mark(state: &AppState, caller: &AuthUser, mark: MarkAttendance) -> Result<Attendance, AppError> {
    caller.require_privileged()?;
    mark.validate()?;

    let owner = resolve_target(state.store.as_ref(), &mark.target).await?;
    let now = state.clock.now();
    let date = mark.date.unwrap_or(now.date());

    let derived_hours = match (mark.check_in, mark.check_out) {
        (Some(check_in), Some(check_out)) => hours_between(check_in, check_out),
        _ => 0.0,
    };

    let record = state
        .store
        .upsert_attendance(NewAttendance {
            user_id: owner.id,
            date,
            check_in: mark.check_in,
            check_out: mark.check_out,
            status: mark.status,
            hours_worked: mark.hours_worked.unwrap_or(derived_hours),
            remarks: mark.remarks.map(|r| r.trim().to_string()),
            created_at: now,
        })
        .await?;

    info!(user_id = owner.id, date = %date, status = %mark.status, by = caller.id(), "Attendance marked");
    Ok(record)
}

/// Newest day first, with each row's owner attached.
pub async fn list(
    state: &AppState,
    caller: &AuthUser,
    query: AttendanceQuery,
    page: Page,
) -> Result<Paged<WithOwner<Attendance>>, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to)
        && to < from
    {
        return Err(AppError::field("to", "`to` must be on or after `from`"));
    }

    let filter = AttendanceFilter {
        user_id: listing_scope(state.store.as_ref(), caller, &query.target).await?,
        from: query.from,
        to: query.to,
        status: query.status,
    };
    let paged = state
        .store
        .list_attendance(&filter, SortOrder::Descending, Some(page))
        .await?;
    let items = with_owners(state.store.as_ref(), paged.items, |r| r.user_id).await?;
    Ok(Paged {
        items,
        total: paged.total,
    })
}

/// Seven days from `week_start` (default: this week's Sunday), oldest first.
pub async fn weekly(
    state: &AppState,
    caller: &AuthUser,
    week_start_on: Option<NaiveDate>,
    target: TargetUser,
) -> Result<WeeklyAttendance, AppError> {
    let start = week_start_on.unwrap_or_else(|| week_start(state.clock.now().date()));
    let (week_start, week_end) = week_bounds(start);

    let filter = AttendanceFilter {
        user_id: listing_scope(state.store.as_ref(), caller, &target).await?,
        from: Some(week_start),
        to: Some(week_end),
        status: None,
    };
    let rows = state
        .store
        .list_attendance(&filter, SortOrder::Ascending, None)
        .await?
        .items;

    Ok(WeeklyAttendance {
        week_start,
        week_end,
        records: with_owners(state.store.as_ref(), rows, |r| r.user_id).await?,
    })
}

/// Status counts and summed hours for one user over a calendar month
/// (default: the current one).
pub async fn monthly_report(
    state: &AppState,
    caller: &AuthUser,
    target: TargetUser,
    month: Option<u32>,
    year: Option<i32>,
) -> Result<MonthlyReport, AppError> {
    let today = state.clock.now().date();
    let month = month.unwrap_or(today.month());
    let year = year.unwrap_or(today.year());
    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| AppError::field("month", "Month must be between 1 and 12"))?;

    let subject = subject_user(state.store.as_ref(), caller, &target).await?;
    let filter = AttendanceFilter {
        user_id: Some(subject.id),
        from: Some(first),
        to: Some(last),
        status: None,
    };
    let records = state
        .store
        .list_attendance(&filter, SortOrder::Ascending, None)
        .await?
        .items;

    Ok(MonthlyReport {
        employee: OwnerSummary::from(&subject),
        month,
        year,
        summary: AttendanceSummary::from_records(&records),
        records,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::role::Role;
    use crate::service::test_support::{at, state, user};

    #[actix_web::test]
    async fn check_in_then_out_computes_hours() {
        let clock = Arc::new(ManualClock::new(at(2024, 3, 4, 9, 0)));
        let state = state(clock.clone());
        let me = user(&state, "E1", Role::Employee).await;

        let opened = check_in(&state, &me).await.unwrap();
        assert_eq!(opened.status, AttendanceStatus::Present);

        clock.advance(Duration::minutes(30));
        assert_eq!(
            check_in(&state, &me).await.unwrap_err().to_string(),
            "You have already checked in today"
        );

        clock.set(at(2024, 3, 4, 17, 0));
        let closed = check_out(&state, &me).await.unwrap();
        assert_eq!(closed.hours_worked, 8.0);
        assert_eq!(closed.id, opened.id);

        assert!(matches!(check_out(&state, &me).await.unwrap_err(), AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn check_out_without_check_in_is_not_found() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 4, 9, 0))));
        let me = user(&state, "E1", Role::Employee).await;
        assert!(matches!(check_out(&state, &me).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn mark_is_privileged_and_overwrites() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 4, 9, 0))));
        let manager = user(&state, "M1", Role::Manager).await;
        let employee = user(&state, "E1", Role::Employee).await;

        let mark_for = |status| MarkAttendance {
            target: TargetUser {
                user_id: None,
                employee_id: Some("E1".into()),
            },
            date: Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            status,
            check_in: None,
            check_out: None,
            hours_worked: None,
            remarks: Some("backfill".into()),
        };

        assert!(matches!(
            mark(&state, &employee, mark_for(AttendanceStatus::Present)).await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        let first = mark(&state, &manager, mark_for(AttendanceStatus::Absent)).await.unwrap();
        let second = mark(&state, &manager, mark_for(AttendanceStatus::Holiday)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.status, AttendanceStatus::Holiday);

        let mut bad = mark_for(AttendanceStatus::Present);
        bad.check_in = Some(at(2024, 3, 1, 17, 0));
        bad.check_out = Some(at(2024, 3, 1, 9, 0));
        assert!(matches!(mark(&state, &manager, bad).await.unwrap_err(), AppError::Validation { .. }));
    }

    #[actix_web::test]
    async fn report_counts_statuses_for_the_month() {
        let clock = Arc::new(ManualClock::new(at(2024, 3, 4, 9, 0)));
        let state = state(clock.clone());
        let admin = user(&state, "A1", Role::Admin).await;
        let me = user(&state, "E1", Role::Employee).await;

        check_in(&state, &me).await.unwrap();
        clock.set(at(2024, 3, 4, 13, 30));
        check_out(&state, &me).await.unwrap();

        mark(
            &state,
            &admin,
            MarkAttendance {
                target: TargetUser {
                    user_id: Some(me.id()),
                    employee_id: None,
                },
                date: Some(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
                status: AttendanceStatus::Leave,
                check_in: None,
                check_out: None,
                hours_worked: None,
                remarks: None,
            },
        )
        .await
        .unwrap();

        let report = monthly_report(&state, &me, TargetUser::default(), None, None).await.unwrap();
        assert_eq!(report.month, 3);
        assert_eq!(report.summary.total_days, 2);
        assert_eq!(report.summary.present, 1);
        assert_eq!(report.summary.leave, 1);
        assert_eq!(report.summary.total_hours, 4.5);

        let february = monthly_report(&state, &me, TargetUser::default(), Some(2), Some(2024))
            .await
            .unwrap();
        assert_eq!(february.summary, AttendanceSummary::default());
    }

    #[actix_web::test]
    async fn weekly_defaults_to_current_week_and_is_scoped() {
        let clock = Arc::new(ManualClock::new(at(2024, 3, 6, 9, 0)));
        let state = state(clock.clone());
        let me = user(&state, "E1", Role::Employee).await;
        let other = user(&state, "E2", Role::Employee).await;

        check_in(&state, &me).await.unwrap();
        check_in(&state, &other).await.unwrap();

        let week = weekly(&state, &me, None, TargetUser::default()).await.unwrap();
        assert_eq!(week.week_start, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(week.week_end, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(week.records.len(), 1);
        assert_eq!(week.records[0].record.user_id, me.id());
    }
}
