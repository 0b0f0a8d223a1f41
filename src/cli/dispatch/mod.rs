//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::tuning;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let tuning = tuning::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        pairing_code_ttl_seconds: tuning.pairing_code_ttl_seconds,
        device_challenge_ttl_seconds: tuning.device_challenge_ttl_seconds,
        lockout_threshold: tuning.lockout_threshold,
        lockout_base_seconds: tuning.lockout_base_seconds,
        lockout_max_seconds: tuning.lockout_max_seconds,
        outbox_poll_seconds: tuning.outbox_poll_seconds,
        outbox_batch_size: tuning.outbox_batch_size,
        outbox_max_attempts: tuning.outbox_max_attempts,
        outbox_backoff_base_seconds: tuning.outbox_backoff_base_seconds,
        outbox_backoff_max_seconds: tuning.outbox_backoff_max_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn dispatches_server_action() {
        temp_env::with_vars(
            [(
                "VAULTLINK_DSN",
                Some("postgres://user@localhost:5432/vaultlink"),
            )],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["vaultlink", "--port", "9090"]);
                let action = handler(&matches).expect("action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 9090);
                assert_eq!(
                    secrecy::ExposeSecret::expose_secret(&args.dsn),
                    "postgres://user@localhost:5432/vaultlink"
                );
                assert_eq!(args.pairing_code_ttl_seconds, 900);
            },
        );
    }
}
