use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_admission_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign access and refresh tokens")
                .env("QUILLKEEP_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("QUILLKEEP_ACCESS_TTL_SECONDS")
                .default_value("10800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token and session TTL in seconds")
                .env("QUILLKEEP_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("io-timeout-ms")
                .long("io-timeout-ms")
                .help("Deadline for each database, identity provider or mail call")
                .env("QUILLKEEP_IO_TIMEOUT_MS")
                .default_value("5000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_admission_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and account completion links")
                .env("QUILLKEEP_FRONTEND_BASE_URL")
                .default_value("https://quillkeep.dev"),
        )
        .arg(
            Arg::new("signup-ttl-seconds")
                .long("signup-ttl-seconds")
                .help("How long a sign-up request stays live, in seconds")
                .env("QUILLKEEP_SIGNUP_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("sweep-hour-utc")
                .long("sweep-hour-utc")
                .help("UTC hour at which stale sign-up requests are expired")
                .env("QUILLKEEP_SWEEP_HOUR_UTC")
                .default_value("0")
                .value_parser(clap::value_parser!(u32).range(0..24)),
        )
}

pub struct Options {
    pub jwt_secret: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub io_timeout_ms: u64,
    pub frontend_base_url: String,
    pub signup_ttl_seconds: i64,
    pub sweep_hour_utc: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is unexpectedly absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            jwt_secret: matches
                .get_one::<String>(ARG_JWT_SECRET)
                .cloned()
                .map(SecretString::from),
            access_ttl_seconds: matches
                .get_one::<i64>("access-ttl-seconds")
                .copied()
                .context("missing access-ttl-seconds")?,
            refresh_ttl_seconds: matches
                .get_one::<i64>("refresh-ttl-seconds")
                .copied()
                .context("missing refresh-ttl-seconds")?,
            io_timeout_ms: matches
                .get_one::<u64>("io-timeout-ms")
                .copied()
                .context("missing io-timeout-ms")?,
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing frontend-base-url")?,
            signup_ttl_seconds: matches
                .get_one::<i64>("signup-ttl-seconds")
                .copied()
                .context("missing signup-ttl-seconds")?,
            sweep_hour_utc: matches
                .get_one::<u32>("sweep-hour-utc")
                .copied()
                .context("missing sweep-hour-utc")?,
        })
    }
}
