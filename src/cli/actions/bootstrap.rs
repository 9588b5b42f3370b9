use crate::api::{
    self,
    handlers::{
        auth::{utils::normalize_email, GoTrueProvider},
        users::{bootstrap_owner, BootstrapOutcome, PgUserStore},
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub identity_url: String,
    pub identity_service_key: SecretString,
    pub owner_email: String,
    pub owner_name: String,
    pub owner_password: SecretString,
    pub io_timeout_ms: u64,
}

/// Execute the owner bootstrap and exit.
/// # Errors
/// Returns an error if the database or identity provider is unreachable, or
/// the email already belongs to a non-owner user.
pub async fn execute(args: Args) -> Result<()> {
    let pool = api::connect(&args.dsn).await?;
    let users = PgUserStore::new(pool);
    let identity = GoTrueProvider::new(&args.identity_url, args.identity_service_key)
        .context("Failed to build identity provider client")?;

    let email = normalize_email(&args.owner_email);
    let outcome = bootstrap_owner(
        &users,
        &identity,
        &email,
        args.owner_name.trim(),
        &args.owner_password,
        Duration::from_millis(args.io_timeout_ms),
    )
    .await?;

    match outcome {
        BootstrapOutcome::Created(user) => {
            info!(user_id = %user.id, email = %user.email, "Owner account created");
        }
        BootstrapOutcome::AlreadyPresent => info!("Owner already exists, nothing to do"),
    }
    Ok(())
}
