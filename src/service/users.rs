use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{invalid, normalize_employee_id, validate_person_name};
use crate::auth::gate::AuthUser;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::{SalaryStructure, User, UserChanges, UserFilter};
use crate::state::AppState;
use crate::store::{Page, Paged};

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    #[validate(
        length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"),
        custom(function = "validate_person_name")
    )]
    pub name: Option<String>,
    #[validate(length(max = 20, message = "Phone cannot exceed 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Address cannot exceed 200 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 50, message = "Position cannot exceed 50 characters"))]
    pub position: Option<String>,
    #[validate(length(max = 50, message = "Department cannot exceed 50 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 512, message = "Profile picture URL cannot exceed 512 characters"))]
    pub profile_picture: Option<String>,
}

/// Administrative update: profile fields plus job and salary data.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserUpdate {
    #[validate(
        length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"),
        custom(function = "validate_person_name")
    )]
    pub name: Option<String>,
    #[validate(length(max = 20, message = "Phone cannot exceed 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Address cannot exceed 200 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 50, message = "Position cannot exceed 50 characters"))]
    pub position: Option<String>,
    #[validate(length(max = 50, message = "Department cannot exceed 50 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 512, message = "Profile picture URL cannot exceed 512 characters"))]
    pub profile_picture: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Employee ID must be 1 to 32 characters"))]
    pub employee_id: Option<String>,
    pub date_of_joining: Option<NaiveDate>,
    #[validate(custom(function = "validate_salary_structure"))]
    pub salary_structure: Option<SalaryStructure>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub role: Role,
}

fn validate_salary_structure(s: &SalaryStructure) -> Result<(), ValidationError> {
    let amounts = [s.basic_salary.unwrap_or(0.0), s.allowances, s.deductions];
    if amounts.iter().all(|v| v.is_finite() && *v >= 0.0) {
        Ok(())
    } else {
        Err(invalid("salary_amount", "Salary amounts cannot be negative"))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

async fn load(state: &AppState, id: u64) -> Result<User, AppError> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn update_profile(state: &AppState, caller: &AuthUser, update: ProfileUpdate) -> Result<User, AppError> {
    update.validate()?;

    let changes = UserChanges {
        name: trimmed(update.name),
        phone: trimmed(update.phone),
        address: trimmed(update.address),
        position: trimmed(update.position),
        department: trimmed(update.department),
        profile_picture: trimmed(update.profile_picture),
        updated_at: Some(state.clock.now()),
        ..Default::default()
    };
    state
        .store
        .update_user(caller.id(), &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn list_users(
    state: &AppState,
    caller: &AuthUser,
    filter: UserFilter,
    page: Page,
) -> Result<Paged<User>, AppError> {
    caller.require_admin()?;
    Ok(state.store.list_users(&filter, page).await?)
}

pub async fn get_user(state: &AppState, caller: &AuthUser, id: u64) -> Result<User, AppError> {
    caller.ensure_can_read(id)?;
    load(state, id).await
}

pub async fn update_user(state: &AppState, caller: &AuthUser, id: u64, update: UserUpdate) -> Result<User, AppError> {
    caller.require_admin()?;
    update.validate()?;
    load(state, id).await?;

    let changes = UserChanges {
        employee_id: normalize_employee_id(update.employee_id.as_deref()),
        name: trimmed(update.name),
        phone: trimmed(update.phone),
        address: trimmed(update.address),
        position: trimmed(update.position),
        department: trimmed(update.department),
        date_of_joining: update.date_of_joining,
        profile_picture: trimmed(update.profile_picture),
        salary_structure: update.salary_structure,
        updated_at: Some(state.clock.now()),
    };
    let user = state
        .store
        .update_user(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = id, by = caller.id(), "User updated");
    Ok(user)
}

pub async fn update_role(state: &AppState, caller: &AuthUser, id: u64, role: Role) -> Result<User, AppError> {
    caller.require_admin()?;
    let user = state
        .store
        .update_role(id, role, state.clock.now())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = id, role = %role, by = caller.id(), "User role updated");
    Ok(user)
}

/// Removes the account and, with it, every attendance, leave and payroll row
/// it owns.
pub async fn delete_user(state: &AppState, caller: &AuthUser, id: u64) -> Result<(), AppError> {
    caller.require_admin()?;
    if id == caller.id() {
        return Err(AppError::InvalidState("You cannot delete your own account".into()));
    }

    let user = load(state, id).await?;
    if !state.store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    state.emails.remove(&user.email).await;

    info!(user_id = id, by = caller.id(), "User deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::service::test_support::{at, state, user};

    #[actix_web::test]
    async fn profile_update_touches_only_given_fields() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let me = user(&state, "E1", Role::Employee).await;

        let updated = update_profile(
            &state,
            &me,
            ProfileUpdate {
                phone: Some(" 555-0100 ".into()),
                department: Some("Engineering".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.job_details.department.as_deref(), Some("Engineering"));
        assert_eq!(updated.name, me.user.name);
    }

    #[actix_web::test]
    async fn admin_only_operations() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        let manager = user(&state, "M1", Role::Manager).await;
        let employee = user(&state, "E1", Role::Employee).await;

        let err = update_role(&state, &manager, employee.id(), Role::Admin).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let promoted = update_role(&state, &admin, employee.id(), Role::Manager).await.unwrap();
        assert_eq!(promoted.role, Role::Manager);

        // managers can read other users, employees cannot
        assert!(get_user(&state, &manager, admin.id()).await.is_ok());
        assert!(matches!(
            get_user(&state, &employee, admin.id()).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[actix_web::test]
    async fn delete_cascades_and_refuses_self() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        let employee = user(&state, "E1", Role::Employee).await;

        assert!(matches!(
            delete_user(&state, &admin, admin.id()).await.unwrap_err(),
            AppError::InvalidState(_)
        ));
        delete_user(&state, &admin, employee.id()).await.unwrap();
        assert!(matches!(
            get_user(&state, &admin, employee.id()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[actix_web::test]
    async fn negative_salary_structure_is_rejected() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        let employee = user(&state, "E1", Role::Employee).await;

        let update = UserUpdate {
            salary_structure: Some(SalaryStructure {
                basic_salary: Some(-1.0),
                allowances: 0.0,
                deductions: 0.0,
            }),
            ..Default::default()
        };
        let err = update_user(&state, &admin, employee.id(), update).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
