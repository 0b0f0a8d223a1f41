//! Device and password challenge material.
//!
//! A device challenge is a random nonce the client must sign with the device
//! private key. A password challenge is derived deterministically from the
//! encrypted vault blob so the client can answer with nothing but a correct
//! password derivation; the server recomputes everything per request and
//! stores nothing.
//!
//! The vault blob wire format is `v1$<salt>$<check>$<iv>$<cipher>` with
//! base64 sections, where `check` is the client-computed SHA-256 of its
//! derived key. The challenge is the truncated SHA-256 of the ciphertext and
//! the expected answer is `SHA-256(challenge || check)`.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const DEVICE_CHALLENGE_BYTES: usize = 32;
const PASSWORD_CHALLENGE_BYTES: usize = 16;
const VAULT_FORMAT_VERSION: &str = "v1";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("stored device public key is invalid")]
    InvalidKey,
    #[error("invalid base64 payload")]
    InvalidEncoding,
    #[error("signature does not match the pending challenge")]
    BadSignature,
    #[error("vault blob is not in a recognized format")]
    MalformedVault,
}

/// Fresh random device challenge, base64-encoded.
pub(crate) fn generate_device_challenge() -> String {
    let mut bytes = [0u8; DEVICE_CHALLENGE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Check an Ed25519 signature over the pending challenge bytes.
pub(crate) fn verify_device_signature(
    public_key_b64: &str,
    challenge_b64: &str,
    signature_b64: &str,
) -> Result<(), ChallengeError> {
    let key_bytes: [u8; 32] = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|_| ChallengeError::InvalidKey)?
        .try_into()
        .map_err(|_| ChallengeError::InvalidKey)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| ChallengeError::InvalidKey)?;

    let challenge = STANDARD
        .decode(challenge_b64)
        .map_err(|_| ChallengeError::InvalidEncoding)?;
    let signature_bytes = STANDARD
        .decode(signature_b64.trim())
        .map_err(|_| ChallengeError::InvalidEncoding)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| ChallengeError::InvalidEncoding)?;

    key.verify(&challenge, &signature)
        .map_err(|_| ChallengeError::BadSignature)
}

/// Challenge pair returned to the client for password verification.
#[derive(Debug)]
pub(crate) struct PasswordChallenge {
    pub(crate) challenge: String,
    pub(crate) derivation_salt: String,
}

struct VaultParts {
    derivation_salt: String,
    password_check: Vec<u8>,
    cipher: Vec<u8>,
}

fn parse_vault_blob(blob: &str) -> Result<VaultParts, ChallengeError> {
    let mut sections = blob.trim().split('$');

    if sections.next() != Some(VAULT_FORMAT_VERSION) {
        return Err(ChallengeError::MalformedVault);
    }
    let derivation_salt = sections
        .next()
        .filter(|salt| !salt.is_empty())
        .ok_or(ChallengeError::MalformedVault)?
        .to_string();
    let password_check = sections
        .next()
        .and_then(|check| STANDARD.decode(check).ok())
        .filter(|check| !check.is_empty())
        .ok_or(ChallengeError::MalformedVault)?;
    // The IV only matters to the client; it just has to be present.
    sections
        .next()
        .filter(|iv| !iv.is_empty())
        .ok_or(ChallengeError::MalformedVault)?;
    let cipher = sections
        .next()
        .and_then(|cipher| STANDARD.decode(cipher).ok())
        .filter(|cipher| !cipher.is_empty())
        .ok_or(ChallengeError::MalformedVault)?;

    Ok(VaultParts {
        derivation_salt,
        password_check,
        cipher,
    })
}

/// Derive the password challenge pair from the stored vault blob.
pub(crate) fn derive_password_challenge(blob: &str) -> Result<PasswordChallenge, ChallengeError> {
    let parts = parse_vault_blob(blob)?;
    let digest = Sha256::digest(&parts.cipher);
    Ok(PasswordChallenge {
        challenge: STANDARD.encode(&digest[..PASSWORD_CHALLENGE_BYTES]),
        derivation_salt: parts.derivation_salt,
    })
}

/// Check a client's password challenge answer against the stored blob.
pub(crate) fn verify_password_challenge_response(
    blob: &str,
    response_b64: &str,
) -> Result<bool, ChallengeError> {
    let parts = parse_vault_blob(blob)?;
    let digest = Sha256::digest(&parts.cipher);

    let mut hasher = Sha256::new();
    hasher.update(&digest[..PASSWORD_CHALLENGE_BYTES]);
    hasher.update(&parts.password_check);
    let expected = hasher.finalize();

    let response = STANDARD
        .decode(response_b64.trim())
        .map_err(|_| ChallengeError::InvalidEncoding)?;

    Ok(expected.as_slice().ct_eq(response.as_slice()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn vault_blob(salt: &str, check: &[u8], cipher: &[u8]) -> String {
        format!(
            "v1${salt}${}${}${}",
            STANDARD.encode(check),
            STANDARD.encode(b"iv"),
            STANDARD.encode(cipher),
        )
    }

    #[test]
    fn device_challenges_are_random_nonces() {
        let first = generate_device_challenge();
        let second = generate_device_challenge();
        assert_ne!(first, second);
        let decoded = STANDARD.decode(&first).expect("base64");
        assert_eq!(decoded.len(), DEVICE_CHALLENGE_BYTES);
    }

    #[test]
    fn signature_round_trip() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let public_key = STANDARD.encode(signing_key.verifying_key().to_bytes());

        let challenge = generate_device_challenge();
        let challenge_bytes = STANDARD.decode(&challenge).expect("base64");
        let signature = STANDARD.encode(signing_key.sign(&challenge_bytes).to_bytes());

        assert_eq!(
            verify_device_signature(&public_key, &challenge, &signature),
            Ok(())
        );
    }

    #[test]
    fn signature_from_wrong_key_is_rejected() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let other_key = SigningKey::from_bytes(&[8u8; 32]);
        let public_key = STANDARD.encode(other_key.verifying_key().to_bytes());

        let challenge = generate_device_challenge();
        let challenge_bytes = STANDARD.decode(&challenge).expect("base64");
        let signature = STANDARD.encode(signing_key.sign(&challenge_bytes).to_bytes());

        assert_eq!(
            verify_device_signature(&public_key, &challenge, &signature),
            Err(ChallengeError::BadSignature)
        );
    }

    #[test]
    fn signature_over_different_challenge_is_rejected() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let public_key = STANDARD.encode(signing_key.verifying_key().to_bytes());

        let stale = STANDARD.decode(generate_device_challenge()).expect("base64");
        let signature = STANDARD.encode(signing_key.sign(&stale).to_bytes());
        let current = generate_device_challenge();

        assert_eq!(
            verify_device_signature(&public_key, &current, &signature),
            Err(ChallengeError::BadSignature)
        );
    }

    #[test]
    fn invalid_key_material_is_rejected() {
        let challenge = generate_device_challenge();
        assert_eq!(
            verify_device_signature("short", &challenge, &challenge),
            Err(ChallengeError::InvalidKey)
        );
        assert_eq!(
            verify_device_signature(&STANDARD.encode([1u8; 16]), &challenge, &challenge),
            Err(ChallengeError::InvalidKey)
        );
    }

    #[test]
    fn password_challenge_is_deterministic_per_blob() {
        let blob = vault_blob("c2FsdA", b"derived-key-check", b"ciphertext");
        let first = derive_password_challenge(&blob).expect("challenge");
        let second = derive_password_challenge(&blob).expect("challenge");
        assert_eq!(first.challenge, second.challenge);
        assert_eq!(first.derivation_salt, "c2FsdA");

        let other = vault_blob("c2FsdA", b"derived-key-check", b"other-ciphertext");
        let third = derive_password_challenge(&other).expect("challenge");
        assert_ne!(first.challenge, third.challenge);
    }

    #[test]
    fn malformed_blobs_are_rejected() {
        for blob in [
            "",
            "v0$a$b$c$d",
            "v1$$b$c$d",
            "v1$salt",
            "v1$salt$!!$iv$data",
            &format!("v1$salt${}$iv$!!", STANDARD.encode(b"check")),
        ] {
            assert!(
                matches!(
                    derive_password_challenge(blob),
                    Err(ChallengeError::MalformedVault)
                ),
                "blob should be rejected: {blob}"
            );
        }
    }

    #[test]
    fn password_challenge_answer_round_trip() {
        let check = b"derived-key-check".to_vec();
        let blob = vault_blob("c2FsdA", &check, b"ciphertext");
        let challenge = derive_password_challenge(&blob).expect("challenge");

        // A client holding the derived key recomputes check and answers.
        let challenge_bytes = STANDARD.decode(&challenge.challenge).expect("base64");
        let mut hasher = Sha256::new();
        hasher.update(&challenge_bytes);
        hasher.update(&check);
        let answer = STANDARD.encode(hasher.finalize());

        assert_eq!(verify_password_challenge_response(&blob, &answer), Ok(true));
        assert_eq!(
            verify_password_challenge_response(&blob, &STANDARD.encode(b"wrong")),
            Ok(false)
        );
        assert_eq!(
            verify_password_challenge_response(&blob, "not base64 !!"),
            Err(ChallengeError::InvalidEncoding)
        );
    }
}
