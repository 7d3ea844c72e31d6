use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum LeaveType {
    Casual,
    #[serde(alias = "Paid")]
    Vacation,
    Sick,
    Personal,
    Maternity,
    Paternity,
    Unpaid,
}

impl LeaveType {
    /// Days granted per calendar year. `None` means the type is not capped.
    pub fn annual_allotment(self) -> Option<u32> {
        match self {
            LeaveType::Casual => Some(12),
            LeaveType::Vacation => Some(15),
            LeaveType::Sick => Some(10),
            LeaveType::Personal => Some(5),
            LeaveType::Maternity => Some(90),
            LeaveType::Paternity => Some(15),
            LeaveType::Unpaid => None,
        }
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// Pending and Approved requests block overlapping applications.
    pub fn is_active(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }

    /// Targets a reviewer may move a Pending request to.
    pub fn is_review_outcome(self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1)]
    pub user_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2024-03-01")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-03-03")]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: String,
    pub status: LeaveStatus,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewer_note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LeaveRequest {
    pub fn days(&self) -> i64 {
        inclusive_days(self.start_date, self.end_date)
    }

    /// Days of this request falling inside `year`.
    pub fn days_in_year(&self, year: i32) -> i64 {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return 0;
        };
        let start = self.start_date.max(first);
        let end = self.end_date.min(last);
        if start > end {
            0
        } else {
            inclusive_days(start, end)
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

/// Reviewer identity stamped onto a request when it leaves Pending.
#[derive(Debug, Clone)]
pub struct Review {
    pub reviewer_id: u64,
    pub reviewed_at: NaiveDateTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeaveFilter {
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub leave_type: Option<LeaveType>,
}

impl LeaveFilter {
    pub fn matches(&self, row: &LeaveRequest) -> bool {
        self.user_id.is_none_or(|id| row.user_id == id)
            && self.status.is_none_or(|s| row.status == s)
            && self.leave_type.is_none_or(|t| row.leave_type == t)
    }
}

/// Day count of `[start, end]`; a single-day request counts as 1.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Whether the new range and an existing range share a calendar day.
///
/// The three shapes are tested separately: an existing range with an
/// endpoint inside the new one (partial overlap on either edge, or the
/// existing range nested inside), and the new range nested inside the
/// existing one.
pub fn ranges_overlap(
    new_start: NaiveDate,
    new_end: NaiveDate,
    existing_start: NaiveDate,
    existing_end: NaiveDate,
) -> bool {
    let starts_inside = existing_start >= new_start && existing_start <= new_end;
    let ends_inside = existing_end >= new_start && existing_end <= new_end;
    let encloses_new = existing_start <= new_start && existing_end >= new_end;
    starts_inside || ends_inside || encloses_new
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn single_day_counts_as_one() {
        assert_eq!(inclusive_days(d(3, 1), d(3, 1)), 1);
        assert_eq!(inclusive_days(d(3, 1), d(3, 3)), 3);
    }

    #[test]
    fn overlap_shapes() {
        // existing 03-05..03-10
        let (es, ee) = (d(3, 5), d(3, 10));
        assert!(ranges_overlap(d(3, 6), d(3, 8), es, ee), "new inside existing");
        assert!(ranges_overlap(d(3, 1), d(3, 20), es, ee), "existing inside new");
        assert!(ranges_overlap(d(3, 1), d(3, 5), es, ee), "left edge");
        assert!(ranges_overlap(d(3, 10), d(3, 12), es, ee), "right edge");
        assert!(!ranges_overlap(d(3, 1), d(3, 4), es, ee));
        assert!(!ranges_overlap(d(3, 11), d(3, 12), es, ee));
    }

    #[test]
    fn days_in_year_clips_to_boundaries() {
        let mut req = LeaveRequest {
            id: 1,
            user_id: 1,
            leave_type: LeaveType::Vacation,
            start_date: NaiveDate::from_ymd_opt(2023, 12, 30).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            reason: "x".into(),
            status: LeaveStatus::Approved,
            reviewed_by: None,
            reviewed_at: None,
            reviewer_note: None,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        };
        assert_eq!(req.days_in_year(2023), 2);
        assert_eq!(req.days_in_year(2024), 2);
        req.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(req.days_in_year(2024), 0);
    }

    #[test]
    fn legacy_paid_type_is_vacation() {
        let t: LeaveType = serde_json::from_str("\"Paid\"").unwrap();
        assert_eq!(t, LeaveType::Vacation);
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric_and_matches_day_sets(
            a in 0i64..60, a_len in 0i64..10, b in 0i64..60, b_len in 0i64..10,
        ) {
            let base = d(1, 1);
            let (a_start, a_end) = (base + chrono::Days::new(a as u64), base + chrono::Days::new((a + a_len) as u64));
            let (b_start, b_end) = (base + chrono::Days::new(b as u64), base + chrono::Days::new((b + b_len) as u64));
            let shares_day = (a..=a + a_len).any(|x| (b..=b + b_len).contains(&x));
            prop_assert_eq!(ranges_overlap(a_start, a_end, b_start, b_end), shares_day);
            prop_assert_eq!(ranges_overlap(b_start, b_end, a_start, a_end), shares_day);
        }
    }
}
