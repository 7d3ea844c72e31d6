//! In-process store. Every operation runs under one mutex, which makes each
//! call atomic and gives the same unique-key behaviour as the SQL schema.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use super::{
    AttendanceStore, LeaveStore, Page, Paged, PayrollStore, StoreError, StoreResult, UserStore,
};
use crate::model::attendance::{
    Attendance, AttendanceFilter, AttendanceStatus, NewAttendance, SortOrder,
};
use crate::model::leave_request::{
    LeaveFilter, LeaveRequest, LeaveStatus, NewLeaveRequest, Review, ranges_overlap,
};
use crate::model::payroll::{
    NewPayroll, PayPeriod, Payment, Payroll, PayrollFilter, PayrollStatus, PayrollUpdate,
};
use crate::model::role::Role;
use crate::model::user::{NewUser, OwnerSummary, User, UserChanges, UserFilter};

#[derive(Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<u64, User>,
    attendance: BTreeMap<u64, Attendance>,
    leaves: BTreeMap<u64, LeaveRequest>,
    payrolls: BTreeMap<u64, Payroll>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: Option<Page>) -> Paged<T> {
    let total = rows.len() as u64;
    let items = match page {
        Some(page) => rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect(),
        None => rows,
    };
    Paged { items, total }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.lock().users.len() as u64)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("Email".into()));
        }
        if let Some(code) = &user.employee_id
            && t.users.values().any(|u| u.employee_id.as_ref() == Some(code))
        {
            return Err(StoreError::Duplicate("Employee ID".into()));
        }

        let id = t.next_id();
        let row = User {
            id,
            employee_id: user.employee_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            phone: None,
            address: None,
            job_details: user.job_details,
            salary_structure: Default::default(),
            profile_picture: None,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.employee_id.as_deref() == Some(employee_id))
            .cloned())
    }

    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<Paged<User>> {
        let t = self.lock();
        let mut rows: Vec<User> = t
            .users
            .values()
            .filter(|u| filter.role.is_none_or(|r| u.role == r))
            .filter(|u| {
                filter
                    .department
                    .as_ref()
                    .is_none_or(|d| u.job_details.department.as_ref() == Some(d))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, Some(page)))
    }

    async fn update_user(&self, id: u64, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut t = self.lock();
        if let Some(code) = &changes.employee_id
            && t
                .users
                .values()
                .any(|u| u.id != id && u.employee_id.as_ref() == Some(code))
        {
            return Err(StoreError::Duplicate("Employee ID".into()));
        }
        Ok(t.users.get_mut(&id).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    async fn update_role(&self, id: u64, role: Role, at: NaiveDateTime) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get_mut(&id).map(|user| {
            user.role = role;
            user.updated_at = at;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: u64) -> StoreResult<bool> {
        let mut t = self.lock();
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.attendance.retain(|_, r| r.user_id != id);
        t.leaves.retain(|_, r| r.user_id != id);
        t.payrolls.retain(|_, r| r.user_id != id);
        for leave in t.leaves.values_mut().filter(|r| r.reviewed_by == Some(id)) {
            leave.reviewed_by = None;
        }
        for payroll in t.payrolls.values_mut().filter(|r| r.generated_by == Some(id)) {
            payroll.generated_by = None;
        }
        Ok(true)
    }

    async fn owner_summaries(&self, ids: &[u64]) -> StoreResult<HashMap<u64, OwnerSummary>> {
        let t = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| t.users.get(id).map(|u| (*id, OwnerSummary::from(u))))
            .collect())
    }

    async fn all_emails(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock().users.values().map(|u| u.email.clone()).collect())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> StoreResult<Option<Attendance>> {
        Ok(self
            .lock()
            .attendance
            .values()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    async fn insert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance> {
        let mut t = self.lock();
        if t
            .attendance
            .values()
            .any(|r| r.user_id == row.user_id && r.date == row.date)
        {
            return Err(StoreError::Duplicate("Attendance for this date".into()));
        }
        let id = t.next_id();
        let record = Attendance {
            id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status: row.status,
            hours_worked: row.hours_worked,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.created_at,
        };
        t.attendance.insert(id, record.clone());
        Ok(record)
    }

    async fn set_check_in(&self, id: u64, at: NaiveDateTime) -> StoreResult<Option<Attendance>> {
        let mut t = self.lock();
        Ok(t.attendance
            .get_mut(&id)
            .filter(|r| r.check_in.is_none())
            .map(|r| {
                r.check_in = Some(at);
                r.status = AttendanceStatus::Present;
                r.updated_at = at;
                r.clone()
            }))
    }

    async fn set_check_out(&self, id: u64, at: NaiveDateTime, hours: f64) -> StoreResult<Option<Attendance>> {
        let mut t = self.lock();
        Ok(t.attendance
            .get_mut(&id)
            .filter(|r| r.check_out.is_none())
            .map(|r| {
                r.check_out = Some(at);
                r.hours_worked = hours;
                r.updated_at = at;
                r.clone()
            }))
    }

    async fn upsert_attendance(&self, row: NewAttendance) -> StoreResult<Attendance> {
        let mut t = self.lock();
        if let Some(existing) = t
            .attendance
            .values_mut()
            .find(|r| r.user_id == row.user_id && r.date == row.date)
        {
            existing.check_in = row.check_in;
            existing.check_out = row.check_out;
            existing.status = row.status;
            existing.hours_worked = row.hours_worked;
            existing.remarks = row.remarks;
            existing.updated_at = row.created_at;
            return Ok(existing.clone());
        }

        let id = t.next_id();
        let record = Attendance {
            id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status: row.status,
            hours_worked: row.hours_worked,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.created_at,
        };
        t.attendance.insert(id, record.clone());
        Ok(record)
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        order: SortOrder,
        page: Option<Page>,
    ) -> StoreResult<Paged<Attendance>> {
        let t = self.lock();
        let mut rows: Vec<Attendance> = t
            .attendance
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        match order {
            SortOrder::Ascending => rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id))),
            SortOrder::Descending => rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id))),
        }
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn insert_leave(&self, row: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let mut t = self.lock();
        let id = t.next_id();
        let record = LeaveRequest {
            id,
            user_id: row.user_id,
            leave_type: row.leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status: LeaveStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            reviewer_note: None,
            created_at: row.created_at,
            updated_at: row.created_at,
        };
        t.leaves.insert(id, record.clone());
        Ok(record)
    }

    async fn find_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.lock().leaves.get(&id).cloned())
    }

    async fn find_overlapping_leave(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        Ok(self
            .lock()
            .leaves
            .values()
            .find(|r| {
                r.user_id == user_id
                    && r.status.is_active()
                    && ranges_overlap(start, end, r.start_date, r.end_date)
            })
            .cloned())
    }

    async fn transition_leave(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        review: Option<Review>,
        at: NaiveDateTime,
    ) -> StoreResult<Option<LeaveRequest>> {
        let mut t = self.lock();
        Ok(t.leaves
            .get_mut(&id)
            .filter(|r| r.status == from)
            .map(|r| {
                r.status = to;
                r.updated_at = at;
                if let Some(review) = review {
                    r.reviewed_by = Some(review.reviewer_id);
                    r.reviewed_at = Some(review.reviewed_at);
                    if review.note.is_some() {
                        r.reviewer_note = review.note;
                    }
                }
                r.clone()
            }))
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: Option<Page>) -> StoreResult<Paged<LeaveRequest>> {
        let t = self.lock();
        let mut rows: Vec<LeaveRequest> = t.leaves.values().filter(|r| filter.matches(r)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, page))
    }

    async fn approved_leaves_in_year(&self, user_id: u64, year: i32) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .lock()
            .leaves
            .values()
            .filter(|r| r.user_id == user_id && r.status == LeaveStatus::Approved && r.days_in_year(year) > 0)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn insert_payroll(&self, row: NewPayroll) -> StoreResult<Payroll> {
        let mut t = self.lock();
        if t
            .payrolls
            .values()
            .any(|p| p.user_id == row.user_id && p.period == row.period)
        {
            return Err(StoreError::Duplicate("Payroll for this period".into()));
        }
        let id = t.next_id();
        let record = Payroll {
            id,
            user_id: row.user_id,
            period: row.period,
            net_salary: row.net_salary(),
            salary: row.salary,
            status: PayrollStatus::Processing,
            payment_date: None,
            payment_method: None,
            generated_by: Some(row.generated_by),
            created_at: row.created_at,
            updated_at: row.created_at,
        };
        t.payrolls.insert(id, record.clone());
        Ok(record)
    }

    async fn find_payroll(&self, id: u64) -> StoreResult<Option<Payroll>> {
        Ok(self.lock().payrolls.get(&id).cloned())
    }

    async fn find_payroll_for_period(&self, user_id: u64, period: PayPeriod) -> StoreResult<Option<Payroll>> {
        Ok(self
            .lock()
            .payrolls
            .values()
            .find(|p| p.user_id == user_id && p.period == period)
            .cloned())
    }

    async fn update_payroll(&self, id: u64, update: &PayrollUpdate) -> StoreResult<Option<Payroll>> {
        Ok(self
            .lock()
            .payrolls
            .get_mut(&id)
            .filter(|p| p.status != PayrollStatus::Paid)
            .map(|p| {
                p.salary = update.salary;
                p.net_salary = update.net_salary;
                p.status = update.status;
                p.payment_method = update.payment_method.clone();
                p.updated_at = update.updated_at;
                p.clone()
            }))
    }

    async fn mark_paid(&self, id: u64, payment: &Payment) -> StoreResult<Option<Payroll>> {
        Ok(self
            .lock()
            .payrolls
            .get_mut(&id)
            .filter(|p| p.status != PayrollStatus::Paid)
            .map(|p| {
                p.status = PayrollStatus::Paid;
                p.payment_date = Some(payment.payment_date);
                p.payment_method = Some(payment.payment_method.clone());
                p.updated_at = payment.updated_at;
                p.clone()
            }))
    }

    async fn list_payrolls(&self, filter: &PayrollFilter, page: Option<Page>) -> StoreResult<Paged<Payroll>> {
        let t = self.lock();
        let mut rows: Vec<Payroll> = t.payrolls.values().filter(|p| filter.matches(p)).cloned().collect();
        rows.sort_by(|a, b| {
            b.period
                .cmp(&a.period)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(paginate(rows, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::LeaveType;
    use crate::model::payroll::SalaryComponents;
    use crate::model::user::JobDetails;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn new_user(email: &str, code: Option<&str>) -> NewUser {
        NewUser {
            employee_id: code.map(str::to_string),
            name: "Test User".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::Employee,
            job_details: JobDetails::default(),
            created_at: now(),
        }
    }

    #[actix_web::test]
    async fn email_and_employee_id_are_unique() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@x.com", Some("E1"))).await.unwrap();

        let dup_email = store.insert_user(new_user("a@x.com", Some("E2"))).await;
        assert_eq!(dup_email.unwrap_err(), StoreError::Duplicate("Email".into()));

        let dup_code = store.insert_user(new_user("b@x.com", Some("E1"))).await;
        assert_eq!(dup_code.unwrap_err(), StoreError::Duplicate("Employee ID".into()));

        // users without a code never collide on it
        store.insert_user(new_user("c@x.com", None)).await.unwrap();
        store.insert_user(new_user("d@x.com", None)).await.unwrap();
    }

    #[actix_web::test]
    async fn attendance_key_is_user_and_date() {
        let store = MemoryStore::new();
        let row = NewAttendance {
            user_id: 1,
            date: now().date(),
            check_in: Some(now()),
            check_out: None,
            status: AttendanceStatus::Present,
            hours_worked: 0.0,
            remarks: None,
            created_at: now(),
        };
        let first = store.insert_attendance(row.clone()).await.unwrap();
        assert!(store.insert_attendance(row).await.is_err());

        // check-in is only written once
        assert!(store.set_check_in(first.id, now()).await.unwrap().is_none());
        assert!(store.set_check_out(first.id, now(), 1.0).await.unwrap().is_some());
        assert!(store.set_check_out(first.id, now(), 2.0).await.unwrap().is_none());
    }

    fn payroll_for(user_id: u64, generated_by: u64) -> NewPayroll {
        NewPayroll {
            user_id,
            period: "2024-01".parse().unwrap(),
            salary: SalaryComponents::default(),
            generated_by,
            created_at: now(),
        }
    }

    #[actix_web::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@x.com", None)).await.unwrap();
        store.insert_payroll(payroll_for(user.id, user.id)).await.unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        let left = store.list_payrolls(&PayrollFilter::default(), None).await.unwrap();
        assert_eq!(left.total, 0);
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[actix_web::test]
    async fn deleting_a_reviewer_clears_their_references() {
        let store = MemoryStore::new();
        let employee = store.insert_user(new_user("e@x.com", None)).await.unwrap();
        let admin = store.insert_user(new_user("a@x.com", None)).await.unwrap();

        let leave = store
            .insert_leave(NewLeaveRequest {
                user_id: employee.id,
                leave_type: LeaveType::Sick,
                start_date: now().date(),
                end_date: now().date(),
                reason: "flu".into(),
                created_at: now(),
            })
            .await
            .unwrap();
        let review = Review {
            reviewer_id: admin.id,
            reviewed_at: now(),
            note: None,
        };
        store
            .transition_leave(leave.id, LeaveStatus::Pending, LeaveStatus::Approved, Some(review), now())
            .await
            .unwrap()
            .unwrap();
        let payroll = store.insert_payroll(payroll_for(employee.id, admin.id)).await.unwrap();

        assert!(store.delete_user(admin.id).await.unwrap());

        let leave = store.find_leave(leave.id).await.unwrap().unwrap();
        assert_eq!(leave.reviewed_by, None);
        assert_eq!(leave.status, LeaveStatus::Approved);
        let payroll = store.find_payroll(payroll.id).await.unwrap().unwrap();
        assert_eq!(payroll.generated_by, None);
    }

    #[actix_web::test]
    async fn paid_payroll_ignores_stale_updates() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@x.com", None)).await.unwrap();
        let payroll = store.insert_payroll(payroll_for(user.id, user.id)).await.unwrap();

        let stale = store.find_payroll(payroll.id).await.unwrap().unwrap();
        let payment = Payment {
            payment_date: now().date(),
            payment_method: "Cash".into(),
            updated_at: now(),
        };
        store.mark_paid(payroll.id, &payment).await.unwrap().unwrap();

        let update = PayrollUpdate {
            salary: stale.salary,
            net_salary: stale.net_salary,
            status: stale.status,
            payment_method: stale.payment_method.clone(),
            updated_at: now(),
        };
        assert!(store.update_payroll(payroll.id, &update).await.unwrap().is_none());

        let kept = store.find_payroll(payroll.id).await.unwrap().unwrap();
        assert_eq!(kept.status, PayrollStatus::Paid);
        assert_eq!(kept.payment_method.as_deref(), Some("Cash"));
    }
}
