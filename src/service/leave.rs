use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{invalid, with_owners};
use crate::auth::gate::{AuthUser, TargetUser, listing_scope, subject_user};
use crate::error::AppError;
use crate::model::leave_request::{
    LeaveFilter, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest, Review,
};
use crate::model::user::{OwnerSummary, WithOwner};
use crate::state::AppState;
use crate::store::{Page, Paged};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_range"))]
pub struct LeaveApplication {
    pub leave_type: LeaveType,
    #[schema(example = "2024-03-01")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-03-03")]
    pub end_date: NaiveDate,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1 to 500 characters"))]
    #[schema(example = "Family event")]
    pub reason: String,
}

fn validate_range(application: &LeaveApplication) -> Result<(), ValidationError> {
    if application.end_date < application.start_date {
        Err(invalid("invalid_range", "End date must be on or after start date"))
    } else if application.reason.trim().is_empty() {
        Err(invalid("reason_required", "Reason is required"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: LeaveStatus,
    #[serde(alias = "managerNote", alias = "adminComment")]
    #[validate(length(max = 500, message = "Reviewer note cannot exceed 500 characters"))]
    pub reviewer_note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeaveQuery {
    pub target: TargetUser,
    pub status: Option<LeaveStatus>,
    pub leave_type: Option<LeaveType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTypeInfo {
    pub leave_type: LeaveType,
    /// Days per calendar year; absent for uncapped types.
    pub annual_allotment: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeBalance {
    pub leave_type: LeaveType,
    pub allotted: Option<u32>,
    pub used: i64,
    /// `allotted - used`; absent for uncapped types.
    pub remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub employee: OwnerSummary,
    pub year: i32,
    pub balances: Vec<TypeBalance>,
}

pub fn leave_types() -> Vec<LeaveTypeInfo> {
    LeaveType::iter()
        .map(|leave_type| LeaveTypeInfo {
            leave_type,
            annual_allotment: leave_type.annual_allotment(),
        })
        .collect()
}

/// Files a Pending request for the caller.
///
/// The overlap check and the insert run under the caller's leave lock, so
/// two concurrent applications cannot both pass the check.
pub async fn apply(state: &AppState, caller: &AuthUser, application: LeaveApplication) -> Result<LeaveRequest, AppError> {
    application.validate()?;

    let _guard = state.leave_locks.acquire(caller.id()).await;

    if let Some(existing) = state
        .store
        .find_overlapping_leave(caller.id(), application.start_date, application.end_date)
        .await?
    {
        warn!(user_id = caller.id(), overlaps = existing.id, "Overlapping leave request rejected");
        return Err(AppError::Conflict(format!(
            "Leave request overlaps an existing {} request from {} to {}",
            existing.status.to_string().to_lowercase(),
            existing.start_date,
            existing.end_date
        )));
    }

    let request = state
        .store
        .insert_leave(NewLeaveRequest {
            user_id: caller.id(),
            leave_type: application.leave_type,
            start_date: application.start_date,
            end_date: application.end_date,
            reason: application.reason.trim().to_string(),
            created_at: state.clock.now(),
        })
        .await?;

    info!(user_id = caller.id(), leave_id = request.id, days = request.days(), "Leave requested");
    Ok(request)
}

async fn load(state: &AppState, id: u64) -> Result<LeaveRequest, AppError> {
    state
        .store
        .find_leave(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Leave request not found".into()))
}

pub async fn get(state: &AppState, caller: &AuthUser, id: u64) -> Result<WithOwner<LeaveRequest>, AppError> {
    let request = load(state, id).await?;
    caller.ensure_can_read(request.user_id)?;

    let mut rows = with_owners(state.store.as_ref(), vec![request], |r| r.user_id).await?;
    rows.pop()
        .ok_or_else(|| AppError::Internal("owner hydration dropped a row".into()))
}

/// Approve or reject a Pending request, stamping the reviewer.
pub async fn update_status(
    state: &AppState,
    caller: &AuthUser,
    id: u64,
    update: StatusUpdate,
) -> Result<LeaveRequest, AppError> {
    caller.require_privileged()?;
    update.validate()?;
    if !update.status.is_review_outcome() {
        return Err(AppError::InvalidState(format!(
            "Invalid status '{}'. Allowed: Approved, Rejected",
            update.status
        )));
    }

    let current = load(state, id).await?;
    let not_pending = |status: LeaveStatus| {
        AppError::InvalidState(format!("Leave request has already been {}", status.to_string().to_lowercase()))
    };
    if current.status != LeaveStatus::Pending {
        return Err(not_pending(current.status));
    }

    let now = state.clock.now();
    let review = Review {
        reviewer_id: caller.id(),
        reviewed_at: now,
        note: update
            .reviewer_note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    };
    let updated = match state
        .store
        .transition_leave(id, LeaveStatus::Pending, update.status, Some(review), now)
        .await?
    {
        Some(updated) => updated,
        // someone else reviewed or cancelled it in between
        None => return Err(not_pending(load(state, id).await?.status)),
    };

    info!(leave_id = id, status = %updated.status, by = caller.id(), "Leave reviewed");
    Ok(updated)
}

/// Owner-only withdrawal of a Pending request.
pub async fn cancel(state: &AppState, caller: &AuthUser, id: u64) -> Result<LeaveRequest, AppError> {
    let current = load(state, id).await?;
    if current.user_id != caller.id() {
        return Err(AppError::Forbidden("You can only cancel your own leave requests".into()));
    }
    let not_pending = || AppError::InvalidState("Only pending leave requests can be cancelled".into());
    if current.status != LeaveStatus::Pending {
        return Err(not_pending());
    }

    let cancelled = state
        .store
        .transition_leave(id, LeaveStatus::Pending, LeaveStatus::Cancelled, None, state.clock.now())
        .await?
        .ok_or_else(not_pending)?;

    info!(leave_id = id, user_id = caller.id(), "Leave cancelled");
    Ok(cancelled)
}

/// Newest first, with owners attached.
pub async fn list(
    state: &AppState,
    caller: &AuthUser,
    query: LeaveQuery,
    page: Page,
) -> Result<Paged<WithOwner<LeaveRequest>>, AppError> {
    let filter = LeaveFilter {
        user_id: listing_scope(state.store.as_ref(), caller, &query.target).await?,
        status: query.status,
        leave_type: query.leave_type,
    };
    let paged = state.store.list_leaves(&filter, Some(page)).await?;
    let items = with_owners(state.store.as_ref(), paged.items, |r| r.user_id).await?;
    Ok(Paged {
        items,
        total: paged.total,
    })
}

/// Per-type allotment minus Approved days inside `year` (default: this year).
pub async fn balance(
    state: &AppState,
    caller: &AuthUser,
    target: TargetUser,
    year: Option<i32>,
) -> Result<LeaveBalance, AppError> {
    let year = year.unwrap_or_else(|| state.clock.now().year());
    let subject = subject_user(state.store.as_ref(), caller, &target).await?;
    let approved = state.store.approved_leaves_in_year(subject.id, year).await?;

    let balances = LeaveType::iter()
        .map(|leave_type| {
            let used: i64 = approved
                .iter()
                .filter(|r| r.leave_type == leave_type)
                .map(|r| r.days_in_year(year))
                .sum();
            let allotted = leave_type.annual_allotment();
            TypeBalance {
                leave_type,
                allotted,
                used,
                remaining: allotted.map(|a| i64::from(a) - used),
            }
        })
        .collect();

    Ok(LeaveBalance {
        employee: OwnerSummary::from(&subject),
        year,
        balances,
    })
}
