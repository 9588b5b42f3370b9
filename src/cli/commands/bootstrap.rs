use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const SUBCOMMAND: &str = "bootstrap-owner";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(SUBCOMMAND)
        .about("Create the blog owner account if none exists, then exit")
        .arg(
            Arg::new("owner-email")
                .long("owner-email")
                .help("Email address of the owner")
                .env("QUILLKEEP_OWNER_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new("owner-name")
                .long("owner-name")
                .help("Display name of the owner")
                .env("QUILLKEEP_OWNER_NAME")
                .default_value("Owner"),
        )
        .arg(
            Arg::new("owner-password")
                .long("owner-password")
                .help("Initial password, registered with the identity provider")
                .env("QUILLKEEP_OWNER_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}

pub struct Options {
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if a required owner argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            email: matches
                .get_one::<String>("owner-email")
                .cloned()
                .context("missing required argument: --owner-email")?,
            name: matches
                .get_one::<String>("owner-name")
                .cloned()
                .unwrap_or_else(|| "Owner".to_string()),
            password: matches
                .get_one::<String>("owner-password")
                .cloned()
                .map(SecretString::from)
                .context("missing required argument: --owner-password")?,
        })
    }
}
