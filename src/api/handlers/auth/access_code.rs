//! Access code hashing and verification.
//!
//! Access codes are device-chosen secrets for the legacy request path. Only
//! the Argon2id PHC string is stored; the plaintext never touches the
//! database. Hashing and verification run on the blocking pool so request
//! tasks are not pinned while Argon2 works.

use anyhow::{anyhow, Context, Result};
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

/// Hash a device access code for storage.
pub(crate) async fn hash_access_code(access_code: &str) -> Result<String> {
    let code = access_code.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(code.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| anyhow!("failed to hash access code"))
    })
    .await
    .context("access code hashing task failed")?
}

/// Verify a presented access code against a stored hash.
///
/// Argon2 re-derives the digest and compares it internally in constant time,
/// so a mismatch costs the same as a match. A stored hash that does not parse
/// verifies as `false` rather than erroring; the caller collapses both into
/// the same generic rejection.
pub(crate) async fn verify_access_code(access_code: &str, stored_hash: &str) -> Result<bool> {
    let code = access_code.to_string();
    let stored = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored) else {
            return false;
        };
        Argon2::default()
            .verify_password(code.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .context("access code verification task failed")
}

#[cfg(test)]
mod tests {
    use super::{hash_access_code, verify_access_code};
    use anyhow::Result;

    #[tokio::test]
    async fn hash_and_verify_round_trip() -> Result<()> {
        let hash = hash_access_code("correct horse").await?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_access_code("correct horse", &hash).await?);
        assert!(!verify_access_code("battery staple", &hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn hashes_are_salted() -> Result<()> {
        let first = hash_access_code("same code").await?;
        let second = hash_access_code("same code").await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_stored_hash_verifies_false() -> Result<()> {
        assert!(!verify_access_code("anything", "not-a-phc-string").await?);
        assert!(!verify_access_code("anything", "").await?);
        Ok(())
    }
}
