//! Request authorization for already-paired devices.
//!
//! Two mutually exclusive credential paths exist: the legacy access code
//! (verified against the stored Argon2 hash) and the signed device challenge.
//! A request carrying neither is not a failure; it gets a fresh challenge so
//! the client can complete the round trip. Every rejection collapses into
//! `Denied`; the reason only goes to the logs.

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error};

use super::access_code::verify_access_code;
use super::challenge::{generate_device_challenge, verify_device_signature};
use super::state::AuthState;
use super::storage::{
    consume_device_challenge, lookup_device_auth, store_device_challenge, DeviceAuthRecord,
};

/// The two authorization paths, resolved from the request fields.
#[derive(Debug)]
pub(crate) enum DeviceCredential {
    LegacyAccessCode(String),
    ChallengeResponse(String),
}

impl DeviceCredential {
    /// Pick the credential path from the optional request fields.
    ///
    /// The legacy access code wins when a client sends both; blanks count
    /// as absent.
    pub(crate) fn from_fields(
        access_code: Option<&str>,
        challenge_response: Option<&str>,
    ) -> Option<Self> {
        if let Some(code) = access_code.map(str::trim).filter(|code| !code.is_empty()) {
            return Some(Self::LegacyAccessCode(code.to_string()));
        }
        challenge_response
            .map(str::trim)
            .filter(|response| !response.is_empty())
            .map(|response| Self::ChallengeResponse(response.to_string()))
    }
}

/// Outcome of the device gate for a sensitive request.
pub(crate) enum RequestAuthorization {
    /// Credential verified; the record carries the authenticated
    /// user/device/group triple plus the vault fields downstream ops need.
    Granted(DeviceAuthRecord),
    /// No credential was presented; a fresh challenge was issued for the
    /// client to sign and retry with.
    ChallengeRequired(String),
    /// Unknown device, revoked device, or failed credential; callers must
    /// not reveal which.
    Denied,
}

/// Gate a request from a supposedly authorized device.
pub(crate) async fn authorize_device_request(
    pool: &PgPool,
    state: &AuthState,
    group_id: i64,
    email: &str,
    device_unique_id: &str,
    access_code: Option<&str>,
    challenge_response: Option<&str>,
) -> Result<RequestAuthorization> {
    let Some(record) = lookup_device_auth(pool, email, device_unique_id, group_id).await? else {
        return Ok(RequestAuthorization::Denied);
    };

    let Some(credential) = DeviceCredential::from_fields(access_code, challenge_response) else {
        let challenge = generate_device_challenge();
        store_device_challenge(
            pool,
            record.device_id,
            &challenge,
            state.config().device_challenge_ttl_seconds(),
        )
        .await?;
        return Ok(RequestAuthorization::ChallengeRequired(challenge));
    };

    match credential {
        DeviceCredential::LegacyAccessCode(code) => {
            let Some(hash) = record
                .access_code_hash
                .as_deref()
                .filter(|hash| !hash.is_empty())
            else {
                debug!(device_id = record.device_id, "no legacy access code hash");
                return Ok(RequestAuthorization::Denied);
            };
            if verify_access_code(&code, hash).await? {
                Ok(RequestAuthorization::Granted(record))
            } else {
                debug!(device_id = record.device_id, "access code mismatch");
                Ok(RequestAuthorization::Denied)
            }
        }
        DeviceCredential::ChallengeResponse(response) => {
            let Some(challenge) = record.session_auth_challenge.clone() else {
                debug!(device_id = record.device_id, "no pending device challenge");
                return Ok(RequestAuthorization::Denied);
            };
            if record.challenge_expired {
                debug!(device_id = record.device_id, "device challenge expired");
                return Ok(RequestAuthorization::Denied);
            }
            let Some(public_key) = record.device_public_key.as_deref() else {
                debug!(device_id = record.device_id, "no device public key");
                return Ok(RequestAuthorization::Denied);
            };
            if let Err(err) = verify_device_signature(public_key, &challenge, &response) {
                debug!(device_id = record.device_id, "device challenge rejected: {err}");
                return Ok(RequestAuthorization::Denied);
            }
            // Single use: the consume predicate re-checks value and expiry,
            // so a concurrent overwrite or duplicate response loses here.
            if consume_device_challenge(pool, record.device_id, &challenge).await? {
                Ok(RequestAuthorization::Granted(record))
            } else {
                debug!(device_id = record.device_id, "device challenge already consumed");
                Ok(RequestAuthorization::Denied)
            }
        }
    }
}

/// Handler-facing wrapper: run the gate and map every non-granted outcome to
/// its transport response, so call sites read as a single early return.
pub(crate) async fn require_device(
    pool: &PgPool,
    state: &super::state::AuthState,
    group_id: i64,
    email: &str,
    device_unique_id: &str,
    access_code: Option<&str>,
    challenge_response: Option<&str>,
) -> Result<DeviceAuthRecord, Response> {
    match authorize_device_request(
        pool,
        state,
        group_id,
        email,
        device_unique_id,
        access_code,
        challenge_response,
    )
    .await
    {
        Ok(RequestAuthorization::Granted(record)) => Ok(record),
        Ok(RequestAuthorization::ChallengeRequired(challenge)) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "deviceChallenge": challenge })),
        )
            .into_response()),
        Ok(RequestAuthorization::Denied) => Err(crate::api::handlers::unauthorized()),
        Err(err) => {
            error!("Device authorization failed: {err}");
            Err(crate::api::handlers::unexpected_failure())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceCredential;

    #[test]
    fn credential_resolution_prefers_access_code() {
        let credential = DeviceCredential::from_fields(Some("code"), Some("response"));
        assert!(matches!(
            credential,
            Some(DeviceCredential::LegacyAccessCode(code)) if code == "code"
        ));
    }

    #[test]
    fn credential_resolution_falls_back_to_challenge() {
        let credential = DeviceCredential::from_fields(None, Some("response"));
        assert!(matches!(
            credential,
            Some(DeviceCredential::ChallengeResponse(response)) if response == "response"
        ));
    }

    #[test]
    fn credential_resolution_ignores_blank_fields() {
        assert!(DeviceCredential::from_fields(None, None).is_none());
        assert!(DeviceCredential::from_fields(Some("  "), Some("")).is_none());
        let credential = DeviceCredential::from_fields(Some(""), Some("response"));
        assert!(matches!(
            credential,
            Some(DeviceCredential::ChallengeResponse(_))
        ));
    }
}
