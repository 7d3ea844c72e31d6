use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
    #[serde(rename = "Half Day", alias = "Half-day")]
    #[strum(serialize = "Half Day")]
    HalfDay,
    Leave,
    Holiday,
}

/// One row per (user, calendar day).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1)]
    pub user_id: u64,
    #[schema(example = "2024-03-01")]
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[schema(example = 8.0)]
    pub hours_worked: f64,
    pub remarks: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub hours_worked: f64,
    pub remarks: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub user_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

impl AttendanceFilter {
    pub fn matches(&self, row: &Attendance) -> bool {
        self.user_id.is_none_or(|id| row.user_id == id)
            && self.from.is_none_or(|d| row.date >= d)
            && self.to.is_none_or(|d| row.date <= d)
            && self.status.is_none_or(|s| row.status == s)
    }
}

/// Per-status counts plus summed hours for one user and month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_days: u32,
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
    pub leave: u32,
    pub holiday: u32,
    pub total_hours: f64,
}

impl AttendanceSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Attendance>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total_days += 1;
            summary.total_hours += record.hours_worked;
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::HalfDay => summary.half_day += 1,
                AttendanceStatus::Leave => summary.leave += 1,
                AttendanceStatus::Holiday => summary.holiday += 1,
            }
        }
        summary.total_hours = (summary.total_hours * 100.0).round() / 100.0;
        summary
    }
}

/// Hours between check-in and check-out, rounded to two decimals.
pub fn hours_between(check_in: NaiveDateTime, check_out: NaiveDateTime) -> f64 {
    let minutes = (check_out - check_in).num_minutes().max(0) as f64;
    (minutes / 60.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn half_day_round_trips_through_storage_name() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "Half Day");
        assert_eq!(
            AttendanceStatus::from_str("Half Day").unwrap(),
            AttendanceStatus::HalfDay
        );
    }

    #[test]
    fn hours_are_rounded_and_never_negative() {
        assert_eq!(hours_between(at(9, 0), at(17, 30)), 8.5);
        assert_eq!(hours_between(at(9, 0), at(9, 20)), 0.33);
        assert_eq!(hours_between(at(17, 0), at(9, 0)), 0.0);
    }
}
