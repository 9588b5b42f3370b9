//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::handlers::users::User;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by login and refresh. The refresh token travels in a cookie only.
#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}
