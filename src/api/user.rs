use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::gate::AuthUser;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::UserFilter;
use crate::response;
use crate::service::users::{self, ProfileUpdate, RoleUpdate, UserUpdate};
use crate::state::AppState;
use crate::store::Page;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 10)]
    pub limit: Option<u32>,
    pub role: Option<Role>,
    #[param(example = "Engineering")]
    pub department: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses(
        (status = 200, description = "Own profile", body = User),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_profile(auth: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(response::ok("Profile retrieved", auth.user))
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let user = users::update_profile(&state, &auth, body.into_inner()).await?;
    Ok(response::ok("Profile updated successfully", user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Paginated users", body = [User]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = Page::new(query.page, query.limit);
    let filter = UserFilter {
        role: query.role,
        department: query.department.filter(|d| !d.trim().is_empty()),
    };
    let users = users::list_users(&state, &auth, filter, page).await?;
    Ok(response::paginated("Users retrieved", page, users))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user = users::get_user(&state, &auth, path.into_inner()).await?;
    Ok(response::ok("User retrieved", user))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Employee ID already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<UserUpdate>,
) -> Result<HttpResponse, AppError> {
    let user = users::update_user(&state, &auth, path.into_inner(), body.into_inner()).await?;
    Ok(response::ok("User updated successfully", user))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = u64, Path, description = "User ID")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_role(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<RoleUpdate>,
) -> Result<HttpResponse, AppError> {
    let user = users::update_role(&state, &auth, path.into_inner(), body.role).await?;
    Ok(response::ok("User role updated successfully", user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User and their records deleted"),
        (status = 400, description = "Cannot delete own account"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    users::delete_user(&state, &auth, path.into_inner()).await?;
    Ok(response::message("User deleted successfully"))
}
