//! Per-request authorization decisions.
//!
//! Rows are readable by their owner and by privileged callers (manager or
//! admin). Listings are never rejected for ordinary users; they are
//! silently narrowed to the caller's own rows instead.

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::LocalBoxFuture;
use serde::Deserialize;
use utoipa::ToSchema;

use super::middleware::authenticate;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::User;
use crate::state::AppState;
use crate::store::Store;

/// The caller, re-loaded from the store for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> u64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_privileged(&self) -> bool {
        self.user.role.is_privileged()
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.user.role == Role::Admin {
            Ok(())
        } else {
            Err(forbidden(self.user.role))
        }
    }

    pub fn require_privileged(&self) -> Result<(), AppError> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(forbidden(self.user.role))
        }
    }

    pub fn access_to(&self, owner_id: u64) -> Access {
        if self.user.id == owner_id {
            Access::OwnRecord
        } else if self.is_privileged() {
            Access::Privileged
        } else {
            Access::Denied
        }
    }

    /// Owner or privileged caller; anyone else is Forbidden.
    pub fn ensure_can_read(&self, owner_id: u64) -> Result<Access, AppError> {
        match self.access_to(owner_id) {
            Access::Denied => Err(forbidden(self.user.role)),
            access => Ok(access),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    OwnRecord,
    Privileged,
    Denied,
}

pub fn forbidden(role: Role) -> AppError {
    AppError::Forbidden(format!(
        "Access denied. User role '{role}' does not have permission to access this resource."
    ))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by the protected scope's middleware.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            let user = user.clone();
            return Box::pin(async move { Ok(user) });
        }

        let state = req.app_data::<Data<AppState>>().cloned();
        let header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .cloned();

        Box::pin(async move {
            let state = state.ok_or_else(|| AppError::Internal("App state missing".into()))?;
            authenticate(&state, header.as_ref()).await
        })
    }
}

/// A reference to another user: numeric id or human-facing employee code.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetUser {
    #[schema(example = 2)]
    pub user_id: Option<u64>,
    #[schema(example = "E100")]
    pub employee_id: Option<String>,
}

impl TargetUser {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self
                .employee_id
                .as_deref()
                .is_none_or(|code| code.trim().is_empty())
    }
}

/// Looks up the named user; NotFound when the reference is dangling.
pub async fn resolve_target(store: &dyn Store, target: &TargetUser) -> Result<User, AppError> {
    let found = if let Some(id) = target.user_id {
        store.find_user(id).await?
    } else if let Some(code) = target.employee_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        store.find_user_by_employee_id(&code.to_uppercase()).await?
    } else {
        return Err(AppError::field("userId", "userId or employeeId is required"));
    };
    found.ok_or_else(|| AppError::NotFound("Employee not found".into()))
}

/// Which owner a listing is restricted to. `None` means every owner.
pub async fn listing_scope(
    store: &dyn Store,
    caller: &AuthUser,
    target: &TargetUser,
) -> Result<Option<u64>, AppError> {
    if !caller.is_privileged() {
        return Ok(Some(caller.id()));
    }
    if target.is_empty() {
        return Ok(None);
    }
    resolve_target(store, target).await.map(|user| Some(user.id))
}

/// The single user a per-user view (report, balance, summary) is about.
/// Ordinary callers always get themselves.
pub async fn subject_user(
    store: &dyn Store,
    caller: &AuthUser,
    target: &TargetUser,
) -> Result<User, AppError> {
    if !caller.is_privileged() || target.is_empty() {
        return Ok(caller.user.clone());
    }
    resolve_target(store, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::{JobDetails, NewUser};
    use crate::store::UserStore;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDateTime;

    fn caller(id: u64, role: Role) -> AuthUser {
        AuthUser {
            user: User {
                id,
                employee_id: None,
                name: "Caller".into(),
                email: format!("u{id}@x.com"),
                password_hash: String::new(),
                role,
                phone: None,
                address: None,
                job_details: Default::default(),
                salary_structure: Default::default(),
                profile_picture: None,
                created_at: NaiveDateTime::default(),
                updated_at: NaiveDateTime::default(),
            },
        }
    }

    #[test]
    fn access_matrix() {
        assert_eq!(caller(1, Role::Employee).access_to(1), Access::OwnRecord);
        assert_eq!(caller(1, Role::Employee).access_to(2), Access::Denied);
        assert_eq!(caller(1, Role::Manager).access_to(2), Access::Privileged);
        assert_eq!(caller(1, Role::Admin).access_to(1), Access::OwnRecord);
    }

    #[test]
    fn forbidden_names_the_role() {
        let err = caller(1, Role::Manager).require_admin().unwrap_err();
        assert!(err.to_string().contains("'manager'"));
        assert!(caller(1, Role::Manager).require_privileged().is_ok());
    }

    #[actix_web::test]
    async fn employees_are_scoped_to_themselves() {
        let store = MemoryStore::new();
        let target = TargetUser {
            user_id: Some(99),
            employee_id: None,
        };
        let scope = listing_scope(&store, &caller(5, Role::Employee), &target).await.unwrap();
        assert_eq!(scope, Some(5));
    }

    #[actix_web::test]
    async fn privileged_unknown_target_is_not_found() {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser {
                employee_id: Some("E100".into()),
                name: "E".into(),
                email: "e@x.com".into(),
                password_hash: String::new(),
                role: Role::Employee,
                job_details: JobDetails::default(),
                created_at: NaiveDateTime::default(),
            })
            .await
            .unwrap();
        let admin = caller(50, Role::Admin);

        let known = TargetUser {
            user_id: None,
            employee_id: Some("e100".into()),
        };
        assert!(listing_scope(&store, &admin, &known).await.unwrap().is_some());

        let unknown = TargetUser {
            user_id: None,
            employee_id: Some("E404".into()),
        };
        let err = listing_scope(&store, &admin, &unknown).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(listing_scope(&store, &admin, &TargetUser::default()).await.unwrap(), None);
    }
}
