//! Session endpoints: login, refresh rotation, logout and the current user.
//!
//! The access token is returned in the body and sent back as a bearer token.
//! The refresh token only ever travels in the `HttpOnly` cookie below.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    Json,
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

use super::{
    principal::Principal,
    state::AuthConfig,
    token::TokenPair,
    types::{AuthResponse, LoginRequest},
    utils::{extract_cookie, normalize_email, valid_email},
};
use crate::api::{
    deadline,
    error::{ApiError, ApiResult},
    handlers::{
        json_body,
        users::{User, UserResponse},
        Outcome,
    },
    state::AppState,
};

pub(crate) const REFRESH_COOKIE_NAME: &str = "quillkeep_refresh";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; refresh cookie set", body = AuthResponse),
        (status = 400, description = "Malformed input", body = Outcome),
        (status = 401, description = "Invalid credentials", body = Outcome)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    let body = json_body(payload)?;
    let email = normalize_email(&body.email);
    if !valid_email(&email) || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let password = SecretString::from(body.password);
    let user = state.credentials().verify(&email, &password).await?;
    let pair = state.tokens().issue(&user).await?;
    info!(user_id = %user.id, "login succeeded");
    token_response(state.config(), pair, user, "Logged in")
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "New token pair; refresh cookie replaced", body = AuthResponse),
        (status = 401, description = "Refresh token missing, expired, revoked or reused", body = Outcome)
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    let presented =
        extract_cookie(&headers, REFRESH_COOKIE_NAME).ok_or(ApiError::Unauthenticated)?;
    let (pair, user) = state.tokens().rotate(&presented).await?;
    token_response(state.config(), pair, user, "Token refreshed")
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session revoked; refresh cookie cleared", body = Outcome),
        (status = 401, description = "Missing or invalid access token", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<(HeaderMap, Json<Outcome>)> {
    state.tokens().revoke(principal.id).await?;
    info!(user_id = %principal.id, "logged out");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_refresh_cookie(state.config()).map_err(cookie_error)?);
    Ok((headers, Json(Outcome::success("Logged out"))))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = Outcome)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<UserResponse>> {
    let user = deadline::within(
        state.config().io_timeout(),
        "user lookup",
        state.users().find_by_id(principal.id),
    )
    .await?
    .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(UserResponse {
        success: true,
        message: "Current user".to_string(),
        user,
    }))
}

fn token_response(
    config: &AuthConfig,
    pair: TokenPair,
    user: User,
    message: &str,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        refresh_cookie(config, &pair.refresh_token).map_err(cookie_error)?,
    );
    Ok((
        headers,
        Json(AuthResponse {
            success: true,
            message: message.to_string(),
            access_token: pair.access_token,
            expires_at: pair.access_expires_at,
            user,
        }),
    ))
}

fn cookie_error(err: InvalidHeaderValue) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("failed to build refresh cookie: {err}"))
}

/// Build a secure `HttpOnly` cookie for the refresh token.
pub(crate) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.refresh_ttl_seconds();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{REFRESH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
