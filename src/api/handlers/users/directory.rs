//! Owner-side user administration: listing, lookup and direct admin creation.
//!
//! Direct creation is the second way into the blog next to the sign-up flow.
//! The owner supplies the email, name and initial password; the account is
//! created with the identity provider first and the user row second.

use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::info;
use uuid::Uuid;

use super::{InsertOutcome, NewUser, Role, User, UserStore};
use crate::api::{
    deadline,
    error::{ApiError, ApiResult},
    handlers::auth::{
        identity::{bounded, IdentityError, IdentityProvider},
        principal::{require_owner, Principal},
        utils::{normalize_email, valid_email},
    },
};

/// Input for `create_admin`.
#[derive(Clone, Debug)]
pub struct NewAdmin {
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

pub struct UserDirectory {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
    io_timeout: Duration,
}

impl UserDirectory {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            users,
            identity,
            io_timeout,
        }
    }

    /// Every user, oldest first. Owner only.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `Internal` if storage fails.
    pub async fn list(&self, acting: &Principal) -> ApiResult<Vec<User>> {
        require_owner(acting)?;
        let users = deadline::within(self.io_timeout, "user list", self.users.list()).await?;
        Ok(users)
    }

    /// Single user by id. Owner only.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `NotFound` for unknown ids.
    pub async fn get(&self, acting: &Principal, id: Uuid) -> ApiResult<User> {
        require_owner(acting)?;
        deadline::within(self.io_timeout, "user lookup", self.users.find_by_id(id))
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Create an `admin` account directly, bypassing the sign-up flow. Owner only.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `BadRequest` for malformed input, `Conflict`
    /// when the email already has a user row or a provider identity,
    /// `Internal` on collaborator failures.
    pub async fn create_admin(&self, acting: &Principal, input: &NewAdmin) -> ApiResult<User> {
        require_owner(acting)?;

        let email = normalize_email(&input.email);
        let name = input.name.trim();
        if !valid_email(&email) {
            return Err(ApiError::bad_request("Invalid email"));
        }
        if name.is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }
        if input.password.expose_secret().is_empty() {
            return Err(ApiError::bad_request("Password is required"));
        }

        let existing = deadline::within(
            self.io_timeout,
            "user lookup",
            self.users.find_by_email(&email),
        )
        .await?;
        if existing.is_some() {
            return Err(ApiError::conflict("An account with this email already exists"));
        }

        match bounded(
            self.io_timeout,
            self.identity.create_account(&email, &input.password),
        )
        .await
        {
            Ok(_) => {}
            Err(IdentityError::AlreadyRegistered) => {
                return Err(ApiError::conflict("An account with this email already exists"));
            }
            Err(err) => return Err(ApiError::Internal(anyhow::anyhow!(err))),
        }

        let new_user = NewUser {
            email,
            name: Some(name.to_string()),
            avatar_url: None,
            bio: None,
            role: Role::Admin,
        };
        match deadline::within(self.io_timeout, "user insert", self.users.insert(&new_user))
            .await?
        {
            InsertOutcome::Created(user) => {
                info!(user_id = %user.id, owner_id = %acting.id, "admin created by owner");
                Ok(user)
            }
            InsertOutcome::Conflict => Err(ApiError::conflict(
                "An account with this email already exists",
            )),
        }
    }
}
