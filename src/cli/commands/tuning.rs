//! Protocol tuning arguments: token lifetimes, lockout curve, email outbox.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_PAIRING_CODE_TTL: &str = "pairing-code-ttl-seconds";
pub const ARG_DEVICE_CHALLENGE_TTL: &str = "device-challenge-ttl-seconds";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_LOCKOUT_BASE: &str = "lockout-base-seconds";
pub const ARG_LOCKOUT_MAX: &str = "lockout-max-seconds";
pub const ARG_OUTBOX_POLL: &str = "outbox-poll-seconds";
pub const ARG_OUTBOX_BATCH: &str = "outbox-batch-size";
pub const ARG_OUTBOX_MAX_ATTEMPTS: &str = "outbox-max-attempts";
pub const ARG_OUTBOX_BACKOFF_BASE: &str = "outbox-backoff-base-seconds";
pub const ARG_OUTBOX_BACKOFF_MAX: &str = "outbox-backoff-max-seconds";

#[derive(Debug)]
pub struct Options {
    pub pairing_code_ttl_seconds: i64,
    pub device_challenge_ttl_seconds: i64,
    pub lockout_threshold: i32,
    pub lockout_base_seconds: u64,
    pub lockout_max_seconds: u64,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_size: usize,
    pub outbox_max_attempts: u32,
    pub outbox_backoff_base_seconds: u64,
    pub outbox_backoff_max_seconds: u64,
}

impl Options {
    /// Extract tuning options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            pairing_code_ttl_seconds: get(matches, ARG_PAIRING_CODE_TTL)?,
            device_challenge_ttl_seconds: get(matches, ARG_DEVICE_CHALLENGE_TTL)?,
            lockout_threshold: get(matches, ARG_LOCKOUT_THRESHOLD)?,
            lockout_base_seconds: get(matches, ARG_LOCKOUT_BASE)?,
            lockout_max_seconds: get(matches, ARG_LOCKOUT_MAX)?,
            outbox_poll_seconds: get(matches, ARG_OUTBOX_POLL)?,
            outbox_batch_size: get(matches, ARG_OUTBOX_BATCH)?,
            outbox_max_attempts: get(matches, ARG_OUTBOX_MAX_ATTEMPTS)?,
            outbox_backoff_base_seconds: get(matches, ARG_OUTBOX_BACKOFF_BASE)?,
            outbox_backoff_max_seconds: get(matches, ARG_OUTBOX_BACKOFF_MAX)?,
        })
    }
}

fn get<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing argument: --{name}"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PAIRING_CODE_TTL)
                .long(ARG_PAIRING_CODE_TTL)
                .help("Lifetime of emailed pairing codes")
                .default_value("900")
                .env("VAULTLINK_PAIRING_CODE_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_DEVICE_CHALLENGE_TTL)
                .long(ARG_DEVICE_CHALLENGE_TTL)
                .help("Lifetime of issued device challenges")
                .default_value("120")
                .env("VAULTLINK_DEVICE_CHALLENGE_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long(ARG_LOCKOUT_THRESHOLD)
                .help("Failed password-challenge attempts before a device is blocked")
                .default_value("5")
                .env("VAULTLINK_LOCKOUT_THRESHOLD")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_BASE)
                .long(ARG_LOCKOUT_BASE)
                .help("Initial block duration once the lockout threshold is reached")
                .default_value("60")
                .env("VAULTLINK_LOCKOUT_BASE_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_MAX)
                .long(ARG_LOCKOUT_MAX)
                .help("Upper bound for the lockout block duration")
                .default_value("3600")
                .env("VAULTLINK_LOCKOUT_MAX_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_POLL)
                .long(ARG_OUTBOX_POLL)
                .help("Email outbox poll interval")
                .default_value("5")
                .env("VAULTLINK_OUTBOX_POLL_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BATCH)
                .long(ARG_OUTBOX_BATCH)
                .help("Email outbox rows processed per poll")
                .default_value("10")
                .env("VAULTLINK_OUTBOX_BATCH_SIZE")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_MAX_ATTEMPTS)
                .long(ARG_OUTBOX_MAX_ATTEMPTS)
                .help("Delivery attempts before an outbox row is marked failed")
                .default_value("5")
                .env("VAULTLINK_OUTBOX_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BACKOFF_BASE)
                .long(ARG_OUTBOX_BACKOFF_BASE)
                .help("Base delay for outbox retry backoff")
                .default_value("5")
                .env("VAULTLINK_OUTBOX_BACKOFF_BASE_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OUTBOX_BACKOFF_MAX)
                .long(ARG_OUTBOX_BACKOFF_MAX)
                .help("Maximum delay for outbox retry backoff")
                .default_value("300")
                .env("VAULTLINK_OUTBOX_BACKOFF_MAX_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        // Cleared through temp_env so the env-override test cannot interfere.
        temp_env::with_vars(
            [("VAULTLINK_DEVICE_CHALLENGE_TTL_SECONDS", None::<&str>)],
            || {
                let command = with_args(Command::new("vaultlink"));
                let matches = command.get_matches_from(vec!["vaultlink"]);
                let options = Options::parse(&matches).expect("options");

                assert_eq!(options.pairing_code_ttl_seconds, 900);
                assert_eq!(options.device_challenge_ttl_seconds, 120);
                assert_eq!(options.lockout_threshold, 5);
                assert_eq!(options.lockout_base_seconds, 60);
                assert_eq!(options.lockout_max_seconds, 3600);
                assert_eq!(options.outbox_poll_seconds, 5);
                assert_eq!(options.outbox_batch_size, 10);
                assert_eq!(options.outbox_max_attempts, 5);
                assert_eq!(options.outbox_backoff_base_seconds, 5);
                assert_eq!(options.outbox_backoff_max_seconds, 300);
            },
        );
    }

    #[test]
    fn overrides_parse() {
        let command = with_args(Command::new("vaultlink"));
        let matches = command.get_matches_from(vec![
            "vaultlink",
            "--pairing-code-ttl-seconds",
            "60",
            "--lockout-threshold",
            "3",
            "--outbox-batch-size",
            "50",
        ]);
        let options = Options::parse(&matches).expect("options");

        assert_eq!(options.pairing_code_ttl_seconds, 60);
        assert_eq!(options.lockout_threshold, 3);
        assert_eq!(options.outbox_batch_size, 50);
    }

    #[test]
    fn env_overrides_parse() {
        temp_env::with_vars(
            [("VAULTLINK_DEVICE_CHALLENGE_TTL_SECONDS", Some("30"))],
            || {
                let command = with_args(Command::new("vaultlink"));
                let matches = command.get_matches_from(vec!["vaultlink"]);
                let options = Options::parse(&matches).expect("options");
                assert_eq!(options.device_challenge_ttl_seconds, 30);
            },
        );
    }
}
