use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;

pub const ARG_VERBOSITY: &str = "verbosity";

const ENV_LOG_LEVEL: &str = "VAULTLINK_LOG_LEVEL";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .help("Verbosity: -v (warn), -vv (info), -vvv (debug), -vvvv (trace)")
            .action(ArgAction::Count),
    )
}

/// Resolve the effective verbosity count.
///
/// Explicit `-v` flags win; `VAULTLINK_LOG_LEVEL` applies only when no flag
/// was passed.
#[must_use]
pub fn verbosity(matches: &ArgMatches) -> u8 {
    let flags = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    if flags > 0 {
        return flags;
    }

    match env::var(ENV_LOG_LEVEL).ok().as_deref() {
        Some("warn") => 1,
        Some("info") => 2,
        Some("debug") => 3,
        Some("trace") => 4,
        _ => 0,
    }
}
