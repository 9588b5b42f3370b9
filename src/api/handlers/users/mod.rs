//! Users: the two-role account model, its storage seam and the owner's
//! user-administration endpoints.
//!
//! Users are created by account creation (consuming an accepted sign-up
//! request), by the owner directly (`POST /v1/users`) or by the owner
//! bootstrap. Passwords never reach this table; the identity provider holds
//! them.

mod bootstrap;
pub mod directory;
pub(crate) mod storage;

pub use bootstrap::{bootstrap_owner, BootstrapOutcome};
pub use directory::{NewAdmin, UserDirectory};
pub use storage::PgUserStore;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{auth::principal::Principal, json_body, path_id, Outcome};
use crate::api::{error::ApiResult, state::AppState, BoxFuture};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub success: bool,
    pub message: String,
    pub users: Vec<User>,
}

/// Owner-supplied fields for a directly created admin.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdminBody {
    pub email: String,
    pub name: String,
    /// Initial password, handed to the identity provider.
    pub password: String,
}

/// Fields accepted when materializing a user row.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
}

#[derive(Debug)]
pub enum InsertOutcome {
    Created(User),
    Conflict,
}

/// Relational storage for users.
pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Option<User>>;
    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<User>>;
    /// Insert a user; a duplicate email yields `InsertOutcome::Conflict`.
    fn insert<'a>(&'a self, user: &'a NewUser) -> BoxFuture<'a, InsertOutcome>;
    fn owner_exists(&self) -> BoxFuture<'_, bool>;
    /// Every user, oldest first.
    fn list(&self) -> BoxFuture<'_, Vec<User>>;
}

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "Every user, oldest first", body = UserListResponse),
        (status = 401, description = "Missing or invalid access token", body = Outcome),
        (status = 403, description = "Caller is not the owner", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<UserListResponse>> {
    let users = state.directory().list(&principal).await?;
    Ok(Json(UserListResponse {
        success: true,
        message: format!("{} users", users.len()),
        users,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 400, description = "Malformed id", body = Outcome),
        (status = 401, description = "Missing or invalid access token", body = Outcome),
        (status = 403, description = "Caller is not the owner", body = Outcome),
        (status = 404, description = "Unknown user", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<UserResponse>> {
    let id = path_id(id)?;
    let user = state.directory().get(&principal, id).await?;
    Ok(Json(UserResponse {
        success: true,
        message: "User found".to_string(),
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateAdminBody,
    responses(
        (status = 201, description = "Admin created", body = UserResponse),
        (status = 400, description = "Invalid input", body = Outcome),
        (status = 401, description = "Missing or invalid access token", body = Outcome),
        (status = 403, description = "Caller is not the owner", body = Outcome),
        (status = 409, description = "Email already has an account", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_admin(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateAdminBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let body = json_body(payload)?;
    let input = NewAdmin {
        email: body.email,
        name: body.name,
        password: SecretString::from(body.password),
    };
    let user = state.directory().create_admin(&principal, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            message: "User created".to_string(),
            user,
        }),
    ))
}

#[cfg(test)]
mod handler_tests;

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_parses_known_values() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("editor".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_value(Role::Owner)?, "owner");
        assert_eq!(Role::Admin.to_string(), "admin");
        Ok(())
    }
}
