//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs: the API server,
//! or the one-shot owner bootstrap when its subcommand is present.

use crate::cli::actions::{bootstrap, server, Action};
use crate::cli::commands::{self, auth, email, identity};
use anyhow::{Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let identity_opts = identity::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    if let Some(sub) = matches.subcommand_matches(commands::bootstrap::SUBCOMMAND) {
        let owner = commands::bootstrap::Options::parse(sub)?;
        return Ok(Action::BootstrapOwner(bootstrap::Args {
            dsn,
            identity_url: identity_opts.url,
            identity_service_key: identity_opts.service_key,
            owner_email: owner.email,
            owner_name: owner.name,
            owner_password: owner.password,
            io_timeout_ms: auth_opts.io_timeout_ms,
        }));
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let jwt_secret = auth_opts
        .jwt_secret
        .context("missing required argument: --jwt-secret")?;
    let email_opts = email::Options::parse(matches);

    Ok(Action::Server(server::Args {
        port,
        dsn,
        jwt_secret,
        identity_url: identity_opts.url,
        identity_service_key: identity_opts.service_key,
        mailer_url: email_opts.url,
        mailer_api_key: email_opts.api_key,
        mail_from: email_opts.from,
        frontend_base_url: auth_opts.frontend_base_url,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        signup_ttl_seconds: auth_opts.signup_ttl_seconds,
        io_timeout_ms: auth_opts.io_timeout_ms,
        sweep_hour_utc: auth_opts.sweep_hour_utc,
    }))
}
