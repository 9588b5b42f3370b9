use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_SERVICE_KEY: &str = "identity-service-key";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Base URL of the identity provider holding passwords")
                .env("QUILLKEEP_IDENTITY_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_SERVICE_KEY)
                .long(ARG_IDENTITY_SERVICE_KEY)
                .help("Service key for the identity provider admin API")
                .env("QUILLKEEP_IDENTITY_SERVICE_KEY")
                .hide_env_values(true)
                .required(true),
        )
}

pub struct Options {
    pub url: String,
    pub service_key: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if a required identity argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_IDENTITY_URL)
            .cloned()
            .context("missing required argument: --identity-url")?;
        let service_key = matches
            .get_one::<String>(ARG_IDENTITY_SERVICE_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --identity-service-key")?;
        Ok(Self { url, service_key })
    }
}
