use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{invalid, normalize_employee_id, validate_person_name};
use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::{JobDetails, NewUser, User};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"),
        custom(function = "validate_person_name")
    )]
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[validate(
        length(min = 6, message = "Password must be at least 6 characters long"),
        custom(function = "validate_password_strength")
    )]
    #[schema(example = "Secret123")]
    pub password: String,
    #[schema(example = "E100")]
    pub employee_id: Option<String>,
    #[validate(length(max = 50, message = "Position cannot exceed 50 characters"))]
    pub position: Option<String>,
    #[validate(length(max = 50, message = "Department cannot exceed 50 characters"))]
    pub department: Option<String>,
    pub date_of_joining: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "Secret123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Session {
    pub token: String,
    pub user: User,
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if upper && lower && digit {
        Ok(())
    } else {
        Err(invalid(
            "password_strength",
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(state: &AppState, email: &str) -> Result<bool, AppError> {
    // Cuckoo filter: an email it has never seen is certainly free.
    if !state.emails.might_exist(email) {
        return Ok(true);
    }
    // Cache: recently confirmed as taken.
    if state.emails.is_taken(email).await {
        return Ok(false);
    }
    Ok(state.store.find_user_by_email(email).await?.is_none())
}

fn issue_token(state: &AppState, user: &User) -> Result<String, AppError> {
    generate_token(
        user.id,
        &user.email,
        user.role,
        &state.config.jwt_secret,
        state.config.token_ttl,
        Utc::now().timestamp(),
    )
}

/// Creates an account and signs it in. The very first account becomes the
/// administrator; every later one is an employee.
pub async fn register(state: &AppState, request: RegisterRequest) -> Result<Session, AppError> {
    request.validate()?;

    let email = normalize_email(&request.email);
    let employee_id = normalize_employee_id(request.employee_id.as_deref());

    if !is_email_available(state, &email).await? {
        return Err(AppError::Conflict("Email already exists".into()));
    }
    if let Some(code) = &employee_id
        && state.store.find_user_by_employee_id(code).await?.is_some()
    {
        return Err(AppError::Conflict("Employee ID already exists".into()));
    }

    let role = if state.store.count_users().await? == 0 {
        Role::Admin
    } else {
        Role::Employee
    };

    let password_hash = hash_password(&request.password)?;
    let user = state
        .store
        .insert_user(NewUser {
            employee_id,
            name: request.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            role,
            job_details: JobDetails {
                position: request.position.map(|p| p.trim().to_string()),
                department: request.department.map(|d| d.trim().to_string()),
                date_of_joining: request.date_of_joining,
            },
            created_at: state.clock.now(),
        })
        .await?;

    state.emails.insert(&email).await;
    info!(user_id = user.id, role = %user.role, "User registered");

    let token = issue_token(state, &user)?;
    Ok(Session { token, user })
}

#[instrument(name = "auth_login", skip(state, request), fields(email = %request.email))]
pub async fn login(state: &AppState, request: LoginRequest) -> Result<Session, AppError> {
    info!("Login request received");
    request.validate()?;

    let invalid_credentials = || AppError::Unauthorized("Invalid credentials".into());

    let user = match state.store.find_user_by_email(&normalize_email(&request.email)).await? {
        Some(user) => user,
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid_credentials());
        }
    };

    debug!(user_id = user.id, "Verifying password");
    if !verify_password(&request.password, &user.password_hash) {
        info!(user_id = user.id, "Invalid credentials: password mismatch");
        return Err(invalid_credentials());
    }

    let token = issue_token(state, &user)?;
    info!(user_id = user.id, "Login successful");
    Ok(Session { token, user })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::jwt::verify_token;
    use crate::clock::ManualClock;
    use crate::service::test_support::{at, state};

    fn registration(name: &str, email: &str, code: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: "Secret123".into(),
            employee_id: code.map(str::to_string),
            position: None,
            department: None,
            date_of_joining: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[actix_web::test]
    async fn first_account_is_admin_then_employees() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let first = register(&state, registration("Ada Admin", "ada@x.com", None)).await.unwrap();
        let second = register(&state, registration("Eve Worker", "eve@x.com", Some(" e100 ")))
            .await
            .unwrap();

        assert_eq!(first.user.role, Role::Admin);
        assert_eq!(second.user.role, Role::Employee);
        assert_eq!(second.user.employee_id.as_deref(), Some("E100"));

        let claims = verify_token(&second.token, &state.config.jwt_secret).unwrap();
        assert_eq!(claims.user_id, second.user.id);
    }

    #[actix_web::test]
    async fn duplicates_name_the_colliding_field() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        register(&state, registration("Eve Worker", "eve@x.com", Some("E100"))).await.unwrap();

        let email = register(&state, registration("Eve Again", "EVE@x.com", None)).await.unwrap_err();
        assert_eq!(email.to_string(), "Email already exists");

        let code = register(&state, registration("Other Person", "other@x.com", Some("e100")))
            .await
            .unwrap_err();
        assert_eq!(code.to_string(), "Employee ID already exists");
    }

    #[actix_web::test]
    async fn weak_input_is_rejected_with_field_errors() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        let mut request = registration("R2D2", "not-an-email", None);
        request.password = "lowercase1".into();

        match register(&state, request).await.unwrap_err() {
            AppError::Validation { errors, .. } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "name", "password"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn login_failures_look_identical() {
        let state = state(Arc::new(ManualClock::new(at(2024, 3, 1, 9, 0))));
        register(&state, registration("Eve Worker", "eve@x.com", None)).await.unwrap();

        let unknown = login(&state, login_request("nobody@x.com", "Secret123")).await.unwrap_err();
        let wrong = login(&state, login_request("eve@x.com", "Wrong123")).await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());

        let ok = login(&state, login_request("Eve@X.com", "Secret123")).await.unwrap();
        assert_eq!(ok.user.email, "eve@x.com");
    }
}
