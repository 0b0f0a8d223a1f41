//! Authentication gate: challenge issuance for authorized devices.
//!
//! `get_authentication_challenges` is the entry point of every sensitive
//! round trip: it classifies the device (revoked, migrated email, still
//! pending, pre-migration) and, for fully migrated devices, issues a fresh
//! device challenge plus a password challenge derived from the vault blob.

pub(crate) mod access_code;
pub(crate) mod challenge;
pub(crate) mod gate;
pub mod lockout;
pub mod state;
pub(crate) mod storage;
pub mod types;

pub use lockout::{LockoutPolicy, NoLockout, ProgressiveLockout};
pub use state::{AuthConfig, AuthState};

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{group_or_default, named_error, normalize_email, unauthorized, unexpected_failure};
use types::{AuthenticationChallengesResponse, GetAuthenticationChallengesRequest};

#[utoipa::path(
    post,
    path = "/get-authentication-challenges",
    request_body = GetAuthenticationChallengesRequest,
    responses(
        (status = 200, description = "Device and password challenges issued", body = AuthenticationChallengesResponse),
        (status = 401, description = "Unknown device, migrated email, or non-authorized status"),
        (status = 404, description = "Revoked device or account without vault data")
    ),
    tag = "auth"
)]
pub async fn get_authentication_challenges(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GetAuthenticationChallengesRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    if email.is_empty() || device_unique_id.is_empty() {
        return unauthorized();
    }

    let record = match storage::lookup_gate_record(&pool, &email, &device_unique_id, group_id).await
    {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to load device for challenges: {err}");
            return unexpected_failure();
        }
    };

    let Some(record) = record else {
        // No row for this identity: either the address was migrated (tell the
        // client where to retry) or the pairing is gone for good.
        return match storage::lookup_email_migration(&pool, &email, group_id).await {
            Ok(Some(new_email)) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "newEmailAddress": new_email })),
            )
                .into_response(),
            Ok(None) => named_error(StatusCode::NOT_FOUND, "revoked"),
            Err(err) => {
                error!("Failed to check email migration: {err}");
                unexpected_failure()
            }
        };
    };

    if matches!(
        record.authorization_status.as_str(),
        "REVOKED_BY_ADMIN" | "REVOKED_BY_USER"
    ) {
        return named_error(StatusCode::NOT_FOUND, "revoked");
    }

    if record.authorization_status != "AUTHORIZED" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "other_authorization_status",
                "authorizationStatus": record.authorization_status,
            })),
        )
            .into_response();
    }

    // Devices still carrying a legacy access-code hash, or without a
    // registered key, must re-pair under the key scheme.
    if record.has_access_code_hash || !record.has_device_public_key {
        return unauthorized();
    }

    let device_challenge = challenge::generate_device_challenge();
    if let Err(err) = storage::store_device_challenge(
        &pool,
        record.device_id,
        &device_challenge,
        auth_state.config().device_challenge_ttl_seconds(),
    )
    .await
    {
        error!("Failed to store device challenge: {err}");
        return unexpected_failure();
    }

    let Some(blob) = record.encrypted_data.filter(|blob| !blob.is_empty()) else {
        // Nothing to authenticate against yet; the device challenge alone
        // lets the client bootstrap its first upload.
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "empty_data", "deviceChallenge": device_challenge })),
        )
            .into_response();
    };

    match challenge::derive_password_challenge(&blob) {
        Ok(password_challenge) => (
            StatusCode::OK,
            Json(AuthenticationChallengesResponse {
                password_challenge: password_challenge.challenge,
                password_derivation_salt: password_challenge.derivation_salt,
                device_challenge,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to derive password challenge: {err}");
            unexpected_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{get_authentication_challenges, AuthConfig, AuthState, NoLockout};
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new(), Arc::new(NoLockout)))
    }

    #[tokio::test]
    async fn missing_payload_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response =
            get_authentication_challenges(None, Extension(pool), Extension(auth_state()), None)
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn blank_fields_are_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_authentication_challenges(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(super::GetAuthenticationChallengesRequest {
                user_email: "  ".to_string(),
                device_id: "d1".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
