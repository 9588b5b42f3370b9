use crate::api::{
    self,
    email::{HttpMailer, LogMailer, Mailer},
    handlers::auth::{AuthConfig, GoTrueProvider, IdentityProvider},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub identity_url: String,
    pub identity_service_key: SecretString,
    pub mailer_url: Option<String>,
    pub mailer_api_key: Option<SecretString>,
    pub mail_from: String,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub signup_ttl_seconds: i64,
    pub io_timeout_ms: u64,
    pub sweep_hour_utc: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a collaborator cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let identity: Arc<dyn IdentityProvider> = Arc::new(
        GoTrueProvider::new(&args.identity_url, args.identity_service_key)
            .context("Failed to build identity provider client")?,
    );

    let mailer: Arc<dyn Mailer> = match (args.mailer_url, args.mailer_api_key) {
        (Some(url), Some(api_key)) => Arc::new(
            HttpMailer::new(url, api_key, args.mail_from).context("Failed to build mailer")?,
        ),
        _ => {
            warn!("No mailer configured, outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    };

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
        .with_signup_ttl_seconds(args.signup_ttl_seconds)
        .with_io_timeout_ms(args.io_timeout_ms)
        .with_sweep_hour_utc(args.sweep_hour_utc);

    debug!("Auth config: {:?}", auth_config);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        args.jwt_secret,
        identity,
        mailer,
    )
    .await
}
