use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::with_owners;
use crate::auth::gate::{AuthUser, TargetUser, listing_scope, resolve_target, subject_user};
use crate::error::AppError;
use crate::model::payroll::{
    NewPayroll, PayPeriod, Payment, Payroll, PayrollFilter, PayrollStatus, PayrollSummary, PayrollUpdate,
    SalaryComponents,
};
use crate::model::user::{OwnerSummary, SalaryStructure, WithOwner};
use crate::state::AppState;
use crate::store::{Page, Paged, StoreError};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayroll {
    #[serde(flatten)]
    pub target: TargetUser,
    #[schema(value_type = String, example = "2024-01")]
    pub period: PayPeriod,
    /// When omitted, every omitted component comes from the employee's
    /// stored salary structure.
    #[schema(example = 5000.0)]
    pub basic_salary: Option<f64>,
    #[schema(example = 200.0)]
    pub allowances: Option<f64>,
    pub bonuses: Option<f64>,
    #[schema(example = 100.0)]
    pub deductions: Option<f64>,
    pub tax: Option<f64>,
}

impl GeneratePayroll {
    fn components(&self, stored: &SalaryStructure) -> Result<SalaryComponents, AppError> {
        let components = match self.basic_salary {
            Some(basic_salary) => SalaryComponents {
                basic_salary,
                allowances: self.allowances.unwrap_or(0.0),
                bonuses: self.bonuses.unwrap_or(0.0),
                deductions: self.deductions.unwrap_or(0.0),
                tax: self.tax.unwrap_or(0.0),
            },
            None => SalaryComponents {
                basic_salary: stored.basic_salary.ok_or_else(|| {
                    AppError::field("basicSalary", "Basic salary is required when the employee has no salary structure")
                })?,
                allowances: self.allowances.unwrap_or(stored.allowances),
                bonuses: self.bonuses.unwrap_or(0.0),
                deductions: self.deductions.unwrap_or(stored.deductions),
                tax: self.tax.unwrap_or(0.0),
            },
        };
        reject_negative(&components)?;
        Ok(components)
    }
}

/// Fields an update may touch. Net salary is always recomputed.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PayrollChanges {
    pub basic_salary: Option<f64>,
    pub allowances: Option<f64>,
    pub bonuses: Option<f64>,
    pub deductions: Option<f64>,
    pub tax: Option<f64>,
    pub status: Option<PayrollStatus>,
    #[validate(length(min = 1, max = 64, message = "Payment method must be 1 to 64 characters"))]
    pub payment_method: Option<String>,
}

impl PayrollChanges {
    pub fn merge(&self, current: SalaryComponents) -> SalaryComponents {
        SalaryComponents {
            basic_salary: self.basic_salary.unwrap_or(current.basic_salary),
            allowances: self.allowances.unwrap_or(current.allowances),
            bonuses: self.bonuses.unwrap_or(current.bonuses),
            deductions: self.deductions.unwrap_or(current.deductions),
            tax: self.tax.unwrap_or(current.tax),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Defaults to today.
    pub payment_date: Option<NaiveDate>,
    /// Defaults to the configured payment method.
    #[validate(length(min = 1, max = 64, message = "Payment method must be 1 to 64 characters"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PayrollQuery {
    pub target: TargetUser,
    pub period: Option<PayPeriod>,
    pub status: Option<PayrollStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePayrollSummary {
    pub employee: OwnerSummary,
    #[serde(flatten)]
    pub summary: PayrollSummary,
}

fn reject_negative(components: &SalaryComponents) -> Result<(), AppError> {
    match components.first_negative() {
        Some(field) => Err(AppError::field(field, format!("{field} cannot be negative"))),
        None => Ok(()),
    }
}

fn already_exists() -> AppError {
    AppError::Conflict("Payroll already exists for this employee and period".into())
}

fn already_paid() -> AppError {
    AppError::InvalidState("Payroll has already been paid".into())
}

fn paid_locked() -> AppError {
    AppError::InvalidState("Paid payroll records cannot be modified".into())
}

async fn load(state: &AppState, id: u64) -> Result<Payroll, AppError> {
    state
        .store
        .find_payroll(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payroll record not found".into()))
}

/// Creates the (employee, period) record with its net salary materialized.
pub async fn generate(state: &AppState, caller: &AuthUser, request: GeneratePayroll) -> Result<Payroll, AppError> {
    caller.require_privileged()?;
    let employee = resolve_target(state.store.as_ref(), &request.target).await?;
    let salary = request.components(&employee.salary_structure)?;

    if state
        .store
        .find_payroll_for_period(employee.id, request.period)
        .await?
        .is_some()
    {
        warn!(user_id = employee.id, period = %request.period, "Duplicate payroll rejected");
        return Err(already_exists());
    }

    let payroll = state
        .store
        .insert_payroll(NewPayroll {
            user_id: employee.id,
            period: request.period,
            salary,
            generated_by: caller.id(),
            created_at: state.clock.now(),
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => already_exists(),
            other => other.into(),
        })?;

    info!(
        payroll_id = payroll.id,
        user_id = employee.id,
        period = %payroll.period,
        net_salary = payroll.net_salary,
        "Payroll generated"
    );
    Ok(payroll)
}

pub async fn update(state: &AppState, caller: &AuthUser, id: u64, changes: PayrollChanges) -> Result<Payroll, AppError> {
    caller.require_privileged()?;
    changes.validate()?;
    if changes.status == Some(PayrollStatus::Paid) {
        return Err(AppError::field("status", "Use the pay endpoint to mark a payroll as paid"));
    }

    let current = load(state, id).await?;
    if current.status == PayrollStatus::Paid {
        return Err(paid_locked());
    }

    let salary = changes.merge(current.salary);
    reject_negative(&salary)?;

    let update = PayrollUpdate {
        salary,
        net_salary: salary.net_salary(),
        status: changes.status.unwrap_or(current.status),
        payment_method: changes.payment_method.or(current.payment_method),
        updated_at: state.clock.now(),
    };
    let Some(updated) = state.store.update_payroll(id, &update).await? else {
        // paid or deleted since it was read
        load(state, id).await?;
        return Err(paid_locked());
    };

    info!(payroll_id = id, net_salary = updated.net_salary, by = caller.id(), "Payroll updated");
    Ok(updated)
}

/// Marks the record Paid. A record already Paid is left untouched.
pub async fn pay(state: &AppState, caller: &AuthUser, id: u64, request: PaymentRequest) -> Result<Payroll, AppError> {
    caller.require_privileged()?;
    request.validate()?;

    let current = load(state, id).await?;
    if current.status == PayrollStatus::Paid {
        return Err(already_paid());
    }

    let now = state.clock.now();
    let payment = Payment {
        payment_date: request.payment_date.unwrap_or(now.date()),
        payment_method: request
            .payment_method
            .unwrap_or_else(|| state.config.default_payment_method.clone()),
        updated_at: now,
    };
    let paid = state.store.mark_paid(id, &payment).await?.ok_or_else(already_paid)?;

    info!(payroll_id = id, method = %payment.payment_method, by = caller.id(), "Payroll paid");
    Ok(paid)
}

pub async fn get(state: &AppState, caller: &AuthUser, id: u64) -> Result<WithOwner<Payroll>, AppError> {
    let payroll = load(state, id).await?;
    caller.ensure_can_read(payroll.user_id)?;

    let mut rows = with_owners(state.store.as_ref(), vec![payroll], |p| p.user_id).await?;
    rows.pop()
        .ok_or_else(|| AppError::Internal("owner hydration dropped a row".into()))
}

/// Newest period first.
pub async fn list(
    state: &AppState,
    caller: &AuthUser,
    query: PayrollQuery,
    page: Page,
) -> Result<Paged<WithOwner<Payroll>>, AppError> {
    let filter = PayrollFilter {
        user_id: listing_scope(state.store.as_ref(), caller, &query.target).await?,
        period: query.period,
        status: query.status,
    };
    let paged = state.store.list_payrolls(&filter, Some(page)).await?;
    let items = with_owners(state.store.as_ref(), paged.items, |p| p.user_id).await?;
    Ok(Paged {
        items,
        total: paged.total,
    })
}

/// Totals over every record of one employee; all zero when there are none.
pub async fn summary(state: &AppState, caller: &AuthUser, target: TargetUser) -> Result<EmployeePayrollSummary, AppError> {
    let subject = subject_user(state.store.as_ref(), caller, &target).await?;
    let filter = PayrollFilter {
        user_id: Some(subject.id),
        ..Default::default()
    };
    let records = state.store.list_payrolls(&filter, None).await?;

    Ok(EmployeePayrollSummary {
        employee: OwnerSummary::from(&subject),
        summary: PayrollSummary::from_records(&records.items),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::role::Role;
    use crate::model::user::UserChanges;
    use crate::service::test_support::{at, state, user};

    fn period(raw: &str) -> PayPeriod {
        raw.parse().unwrap()
    }

    fn for_employee(code: &str, raw_period: &str) -> GeneratePayroll {
        GeneratePayroll {
            target: TargetUser {
                user_id: None,
                employee_id: Some(code.into()),
            },
            period: period(raw_period),
            basic_salary: Some(5000.0),
            allowances: Some(200.0),
            bonuses: None,
            deductions: Some(100.0),
            tax: None,
        }
    }

    #[actix_web::test]
    async fn generate_materializes_net_and_rejects_duplicates() {
        let state = state(Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        user(&state, "E100", Role::Employee).await;

        let payroll = generate(&state, &admin, for_employee("e100", "2024-01")).await.unwrap();
        assert_eq!(payroll.net_salary, 5100.0);
        assert_eq!(payroll.status, PayrollStatus::Processing);
        assert_eq!(payroll.generated_by, Some(admin.id()));

        // the other spelling of the same period collides
        let err = generate(&state, &admin, for_employee("E100", "01/2024")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let all = list(&state, &admin, PayrollQuery::default(), Page::new(None, None)).await.unwrap();
        assert_eq!(all.total, 1);
    }

    #[actix_web::test]
    async fn generate_requires_privilege_and_non_negative_amounts() {
        let state = state(Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0))));
        let manager = user(&state, "M1", Role::Manager).await;
        let employee = user(&state, "E100", Role::Employee).await;

        assert!(matches!(
            generate(&state, &employee, for_employee("E100", "2024-01")).await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        let mut negative = for_employee("E100", "2024-01");
        negative.tax = Some(-5.0);
        match generate(&state, &manager, negative).await.unwrap_err() {
            AppError::Validation { errors, .. } => assert_eq!(errors[0].field, "tax"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            generate(&state, &manager, for_employee("E999", "2024-01")).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[actix_web::test]
    async fn omitted_basic_uses_salary_structure() {
        let state = state(Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        let employee = user(&state, "E100", Role::Employee).await;

        let mut request = for_employee("E100", "2024-01");
        request.basic_salary = None;
        request.allowances = None;
        request.deductions = None;
        assert!(matches!(
            generate(&state, &admin, request.clone()).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        state
            .store
            .update_user(
                employee.id(),
                &UserChanges {
                    salary_structure: Some(SalaryStructure {
                        basic_salary: Some(4000.0),
                        allowances: 500.0,
                        deductions: 50.0,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let payroll = generate(&state, &admin, request).await.unwrap();
        assert_eq!(payroll.salary.basic_salary, 4000.0);
        assert_eq!(payroll.net_salary, 4450.0);
    }

    #[actix_web::test]
    async fn update_recomputes_net_and_payment_is_final() {
        let clock = Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0)));
        let state = state(clock.clone());
        let admin = user(&state, "A1", Role::Admin).await;
        user(&state, "E100", Role::Employee).await;
        let payroll = generate(&state, &admin, for_employee("E100", "2024-01")).await.unwrap();

        let changes = PayrollChanges {
            bonuses: Some(300.0),
            tax: Some(400.0),
            ..Default::default()
        };
        let updated = update(&state, &admin, payroll.id, changes).await.unwrap();
        assert_eq!(updated.net_salary, 5000.0);

        let mark_paid = PayrollChanges {
            status: Some(PayrollStatus::Paid),
            ..Default::default()
        };
        assert!(matches!(
            update(&state, &admin, payroll.id, mark_paid).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        clock.set(at(2024, 2, 5, 10, 0));
        let paid = pay(&state, &admin, payroll.id, PaymentRequest::default()).await.unwrap();
        assert_eq!(paid.status, PayrollStatus::Paid);
        assert_eq!(paid.payment_date, NaiveDate::from_ymd_opt(2024, 2, 5));
        assert_eq!(paid.payment_method.as_deref(), Some("Bank Transfer"));

        assert!(matches!(
            pay(&state, &admin, payroll.id, PaymentRequest::default()).await.unwrap_err(),
            AppError::InvalidState(_)
        ));
        assert!(matches!(
            update(&state, &admin, payroll.id, PayrollChanges::default()).await.unwrap_err(),
            AppError::InvalidState(_)
        ));
    }

    #[actix_web::test]
    async fn summary_is_scoped_and_zero_when_empty() {
        let state = state(Arc::new(ManualClock::new(at(2024, 2, 1, 9, 0))));
        let admin = user(&state, "A1", Role::Admin).await;
        let employee = user(&state, "E100", Role::Employee).await;
        let other = user(&state, "E200", Role::Employee).await;

        let empty = summary(&state, &employee, TargetUser::default()).await.unwrap();
        assert_eq!(empty.summary, PayrollSummary::default());

        generate(&state, &admin, for_employee("E100", "2024-01")).await.unwrap();
        generate(&state, &admin, for_employee("E100", "2024-02")).await.unwrap();
        generate(&state, &admin, for_employee("E200", "2024-01")).await.unwrap();

        // an employee naming someone else still gets their own figures
        let prying = TargetUser {
            user_id: Some(other.id()),
            employee_id: None,
        };
        let mine = summary(&state, &employee, prying).await.unwrap();
        assert_eq!(mine.employee.id, employee.id());
        assert_eq!(mine.summary.record_count, 2);
        assert_eq!(mine.summary.total_net_salary, 10_200.0);
        assert_eq!(mine.summary.average_net_salary, 5100.0);

        let listed = list(&state, &employee, PayrollQuery::default(), Page::new(None, None)).await.unwrap();
        assert_eq!(listed.total, 2);
        assert_eq!(listed.items[0].record.period, period("2024-02"));
    }

    fn amount() -> impl Strategy<Value = Option<f64>> {
        proptest::option::of(0.0f64..1_000_000.0)
    }

    proptest! {
        #[test]
        fn merged_net_always_follows_the_formula(
            basic in amount(), allowances in amount(), bonuses in amount(),
            deductions in amount(), tax in amount(),
        ) {
            let current = SalaryComponents {
                basic_salary: 1000.0,
                allowances: 10.0,
                bonuses: 20.0,
                deductions: 30.0,
                tax: 40.0,
            };
            let changes = PayrollChanges { basic_salary: basic, allowances, bonuses, deductions, tax, ..Default::default() };
            let merged = changes.merge(current);

            prop_assert_eq!(merged.basic_salary, basic.unwrap_or(1000.0));
            prop_assert_eq!(merged.tax, tax.unwrap_or(40.0));
            let expected = merged.basic_salary + merged.allowances + merged.bonuses - merged.deductions - merged.tax;
            prop_assert!((merged.net_salary() - expected).abs() < 1e-6);
            prop_assert!(merged.first_negative().is_none());
        }

        #[test]
        fn any_negative_component_is_rejected(idx in 0usize..5, value in -1_000_000.0f64..-0.01) {
            let mut amounts = [100.0; 5];
            amounts[idx] = value;
            let components = SalaryComponents {
                basic_salary: amounts[0],
                allowances: amounts[1],
                bonuses: amounts[2],
                deductions: amounts[3],
                tax: amounts[4],
            };
            prop_assert!(reject_negative(&components).is_err());
        }
    }
}
