//! `-v` / `QUILLKEEP_LOG_LEVEL`: how loud the service logs.

use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Position is the verbosity count each name stands for.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept a level name or its count (`0`-`4`) from the environment.
fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim().to_lowercase();
    let count = value.parse::<u8>().ok().or_else(|| {
        LEVEL_NAMES
            .iter()
            .position(|name| *name == value)
            .and_then(|index| u8::try_from(index).ok())
    });
    count
        .filter(|count| usize::from(*count) < LEVEL_NAMES.len())
        .ok_or_else(|| {
            format!(
                "invalid log level '{value}', expected 0-4 or one of: {}",
                LEVEL_NAMES.join(", ")
            )
        })
}

/// Default tracing level for a verbosity count; `None` leaves the ERROR default.
#[must_use]
pub const fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("QUILLKEEP_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::new(parse_level)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_counts() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level(" Debug "), Ok(3));
        assert_eq!(parse_level("4"), Ok(4));
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(parse_level("5").is_err());
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::WARN));
        assert_eq!(level_for(2), Some(Level::INFO));
        assert_eq!(level_for(3), Some(Level::DEBUG));
        assert_eq!(level_for(9), Some(Level::TRACE));
    }
}
