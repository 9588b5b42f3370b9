//! Admission gate: bearer-token authentication for guarded routes.
//!
//! Flow Overview: read `Authorization: Bearer <access token>`, verify it
//! statelessly with the token authority, and attach a `Principal` to the
//! request extensions. The gate proves authenticity only; role checks happen in
//! the operation that needs them.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use super::utils::extract_bearer_token;
use crate::api::{
    error::{ApiError, ApiResult},
    handlers::users::Role,
    state::AppState,
};

/// Authenticated caller, decoded from the access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

/// Middleware for guarded routes; rejects with a structured 401.
pub async fn require_auth(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &request) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn authenticate(state: &AppState, request: &Request) -> ApiResult<Principal> {
    let token = extract_bearer_token(request.headers()).ok_or(ApiError::Unauthenticated)?;
    let claims = state.tokens().verify_access(&token)?;
    Ok(Principal {
        id: claims.id,
        email: claims.email,
        role: claims.role,
    })
}

/// Owner-only operations call this first.
///
/// # Errors
/// `Forbidden` for any non-owner principal.
pub fn require_owner(principal: &Principal) -> ApiResult<()> {
    if principal.is_owner() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the blog owner can do this"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "p@x.com".to_string(),
            role,
        }
    }

    #[test]
    fn owner_passes_owner_check() {
        assert!(require_owner(&principal(Role::Owner)).is_ok());
    }

    #[test]
    fn admin_is_forbidden() {
        assert!(matches!(
            require_owner(&principal(Role::Admin)),
            Err(ApiError::Forbidden(_))
        ));
    }
}
