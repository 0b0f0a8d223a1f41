//! # Vaultlink (Password Vault Synchronization Backend)
//!
//! `vaultlink` pairs client devices to user accounts and serves an encrypted
//! password vault to devices that prove themselves through a challenge-response
//! step. The server never sees the vault password or the keys derived from it.
//!
//! ## Device Pairing
//!
//! A new device requests access with its chosen access code; the server emails
//! a short one-time pairing code to the account address. Confirming with that
//! code flips the device from `PENDING` to `AUTHORIZED`. Revocations
//! (`REVOKED_BY_ADMIN`, `REVOKED_BY_USER`) are terminal.
//!
//! ## Request Authentication
//!
//! Authorized devices authenticate each sensitive request with either their
//! legacy access code or a signed Ed25519 device challenge, plus a password
//! challenge derived from the encrypted vault blob itself. Wrong-credential
//! failures are collapsed into one generic rejection to prevent enumeration
//! of which factor was wrong.
//!
//! ## Recovery
//!
//! An escrowed encrypted password backup can be retrieved only with a valid,
//! unexpired, single-use reset token created by an out-of-band recovery flow.
//! Repeated failed password-challenge attempts trigger a progressive lockout.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
