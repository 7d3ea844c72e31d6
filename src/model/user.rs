use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[schema(example = "Software Engineer")]
    pub position: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "2024-01-15")]
    pub date_of_joining: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryStructure {
    #[schema(example = 5000.0)]
    pub basic_salary: Option<f64>,
    #[schema(example = 200.0)]
    pub allowances: f64,
    #[schema(example = 100.0)]
    pub deductions: f64,
}

/// A persisted account. The password hash never leaves the store layer in
/// serialized form.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "E100", nullable = true)]
    pub employee_id: Option<String>,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub job_details: JobDetails,
    pub salary_structure: SalaryStructure,
    pub profile_picture: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub employee_id: Option<String>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub job_details: JobDetails,
    pub created_at: NaiveDateTime,
}

/// Mutable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub date_of_joining: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub salary_structure: Option<SalaryStructure>,
    pub updated_at: Option<NaiveDateTime>,
}

impl UserChanges {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.employee_id {
            user.employee_id = Some(v.clone());
        }
        if let Some(v) = &self.name {
            user.name = v.clone();
        }
        if let Some(v) = &self.phone {
            user.phone = Some(v.clone());
        }
        if let Some(v) = &self.address {
            user.address = Some(v.clone());
        }
        if let Some(v) = &self.position {
            user.job_details.position = Some(v.clone());
        }
        if let Some(v) = &self.department {
            user.job_details.department = Some(v.clone());
        }
        if let Some(v) = self.date_of_joining {
            user.job_details.date_of_joining = Some(v);
        }
        if let Some(v) = &self.profile_picture {
            user.profile_picture = Some(v.clone());
        }
        if let Some(v) = &self.salary_structure {
            user.salary_structure = v.clone();
        }
        if let Some(v) = self.updated_at {
            user.updated_at = v;
        }
    }
}

/// Minimal identity attached to ledger rows when they are listed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: u64,
    pub employee_id: Option<String>,
    pub name: String,
    pub email: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            employee_id: user.employee_id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<String>,
}

/// Ledger row joined with its owner's identity.
#[derive(Debug, Clone, Serialize)]
pub struct WithOwner<T> {
    #[serde(flatten)]
    pub record: T,
    pub employee: Option<OwnerSummary>,
}
