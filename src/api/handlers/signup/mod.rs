//! Sign-up admission endpoints.
//!
//! Anonymous callers may request membership, check a request and complete an
//! accepted one. Listing and deciding requests sit behind the admission gate
//! and are owner-only.

pub mod engine;
pub mod storage;
pub mod sweep;
pub mod types;

pub use engine::SignupEngine;
pub use storage::{PgSignupStore, SignupStore};
pub use sweep::spawn_sweeper;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{auth::principal::Principal, json_body, path_id, users::UserResponse, Outcome};
use crate::api::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use types::{
    CreateAccountRequest, Decision, DecisionBody, SignupListResponse, SignupReceiptResponse,
    SignupRequestBody, SignupRequestResponse, SignupStatus,
};

#[utoipa::path(
    post,
    path = "/v1/signup-requests",
    request_body = SignupRequestBody,
    responses(
        (status = 200, description = "Request recorded or already in flight", body = SignupReceiptResponse),
        (status = 400, description = "Invalid input or email delivery failed", body = Outcome),
        (status = 409, description = "Email already has an account", body = Outcome)
    ),
    tag = "signup"
)]
pub async fn request_signup(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SignupRequestBody>, JsonRejection>,
) -> ApiResult<Json<SignupReceiptResponse>> {
    let body = json_body(payload)?;
    let receipt = state.signups().request(&body.email, &body.name).await?;
    let message = match (receipt.created, receipt.status) {
        (true, _) => "Sign-up request received",
        (false, SignupStatus::Accepted) => "Sign-up request already accepted",
        (false, _) => "Sign-up request already pending",
    };
    Ok(Json(SignupReceiptResponse {
        success: true,
        message: message.to_string(),
        status: receipt.status,
        can_resend: receipt.can_resend,
        expires_at: receipt.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/signup-requests/{id}/decision",
    params(("id" = Uuid, Path, description = "Sign-up request id")),
    request_body = DecisionBody,
    responses(
        (status = 200, description = "Decision recorded", body = SignupRequestResponse),
        (status = 400, description = "Not pending, expired, invalid decision or email failed", body = Outcome),
        (status = 401, description = "Missing or invalid access token", body = Outcome),
        (status = 403, description = "Caller is not the owner", body = Outcome),
        (status = 404, description = "Unknown request", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "signup"
)]
pub async fn decide_signup(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<Json<SignupRequestResponse>> {
    let id = path_id(id)?;
    let body = json_body(payload)?;
    let decision = body
        .status
        .parse::<Decision>()
        .map_err(ApiError::bad_request)?;
    let request = state.signups().approve(&principal, id, decision).await?;
    Ok(Json(SignupRequestResponse {
        success: true,
        message: format!("Sign-up request {}", request.status),
        request,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/signup-requests",
    responses(
        (status = 200, description = "Newest request per email", body = SignupListResponse),
        (status = 401, description = "Missing or invalid access token", body = Outcome),
        (status = 403, description = "Caller is not the owner", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "signup"
)]
pub async fn list_signups(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<SignupListResponse>> {
    let requests = state.signups().list(&principal).await?;
    Ok(Json(SignupListResponse {
        success: true,
        message: format!("{} sign-up requests", requests.len()),
        requests,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/signup-requests/{id}",
    params(("id" = Uuid, Path, description = "Sign-up request id")),
    responses(
        (status = 200, description = "Current request state", body = SignupRequestResponse),
        (status = 404, description = "Unknown request", body = Outcome)
    ),
    tag = "signup"
)]
pub async fn check_signup(
    Extension(state): Extension<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<SignupRequestResponse>> {
    let id = path_id(id)?;
    let request = state.signups().check(id).await?;
    Ok(Json(SignupRequestResponse {
        success: true,
        message: format!("Sign-up request is {}", request.status),
        request,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input", body = Outcome),
        (status = 404, description = "Request missing, not accepted or already used", body = Outcome),
        (status = 409, description = "Account already exists", body = Outcome)
    ),
    tag = "signup"
)]
pub async fn create_account(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let body = json_body(payload)?;
    let user = state.signups().create_account(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            message: "Account created".to_string(),
            user,
        }),
    ))
}
