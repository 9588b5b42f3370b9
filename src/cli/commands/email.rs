use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_MAILER_URL: &str = "mailer-url";
pub const ARG_MAILER_API_KEY: &str = "mailer-api-key";
pub const ARG_MAIL_FROM: &str = "mail-from";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAILER_URL)
                .long(ARG_MAILER_URL)
                .help("HTTP endpoint of the transactional mail provider; emails are only logged when unset")
                .env("QUILLKEEP_MAILER_URL")
                .requires(ARG_MAILER_API_KEY),
        )
        .arg(
            Arg::new(ARG_MAILER_API_KEY)
                .long(ARG_MAILER_API_KEY)
                .help("API key for the mail provider")
                .env("QUILLKEEP_MAILER_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for outgoing email")
                .env("QUILLKEEP_MAIL_FROM")
                .default_value("Quillkeep <no-reply@quillkeep.dev>"),
        )
}

/// Mail delivery settings; `url` absent means log-only delivery.
pub struct Options {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            url: matches.get_one::<String>(ARG_MAILER_URL).cloned(),
            api_key: matches
                .get_one::<String>(ARG_MAILER_API_KEY)
                .cloned()
                .map(SecretString::from),
            from: matches
                .get_one::<String>(ARG_MAIL_FROM)
                .cloned()
                .unwrap_or_else(|| "Quillkeep <no-reply@quillkeep.dev>".to_string()),
        }
    }
}
