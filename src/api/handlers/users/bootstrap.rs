//! One-shot owner bootstrap, run at deployment init.

use anyhow::{anyhow, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{info, warn};

use super::{InsertOutcome, NewUser, Role, User, UserStore};
use crate::api::{
    deadline,
    handlers::auth::identity::{bounded, IdentityError, IdentityProvider},
};

#[derive(Debug)]
pub enum BootstrapOutcome {
    Created(User),
    /// An owner already exists; nothing was changed.
    AlreadyPresent,
}

/// Create the blog owner unless one already exists.
///
/// The identity-provider account is created first; an "already registered"
/// answer is tolerated so a half-finished earlier run can be completed.
///
/// # Errors
/// Returns an error if storage or the identity provider fails, or if the
/// email already belongs to a non-owner user.
pub async fn bootstrap_owner(
    users: &dyn UserStore,
    identity: &dyn IdentityProvider,
    email: &str,
    name: &str,
    password: &SecretString,
    io_timeout: Duration,
) -> Result<BootstrapOutcome> {
    if deadline::within(io_timeout, "owner lookup", users.owner_exists()).await? {
        info!("owner already present, bootstrap is a no-op");
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    match bounded(io_timeout, identity.create_account(email, password)).await {
        Ok(_) => {}
        Err(IdentityError::AlreadyRegistered) => {
            warn!("owner identity already registered with the provider, reusing it");
        }
        Err(err) => return Err(anyhow!("failed to create owner identity: {err}")),
    }

    let new_user = NewUser {
        email: email.to_string(),
        name: Some(name.to_string()),
        avatar_url: None,
        bio: None,
        role: Role::Owner,
    };
    match deadline::within(io_timeout, "owner insert", users.insert(&new_user)).await? {
        InsertOutcome::Created(user) => {
            info!(user_id = %user.id, "owner bootstrapped");
            Ok(BootstrapOutcome::Created(user))
        }
        InsertOutcome::Conflict => Err(anyhow!(
            "a user with email {email} already exists and is not the owner"
        )),
    }
}
