//! Vault data endpoints: fetch and replace the encrypted blob.
//!
//! Both operations sit behind the device gate. Fetching additionally
//! requires a correct password-challenge answer, with failed answers feeding
//! the lockout policy, so a stolen but paired device cannot pull the vault
//! by itself.

pub(crate) mod storage;
pub mod types;

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

use super::auth::challenge::{
    derive_password_challenge, verify_password_challenge_response, ChallengeError,
};
use super::auth::gate::require_device;
use super::auth::storage::{clear_password_failures, register_password_failure, DeviceAuthRecord};
use super::auth::AuthState;
use super::{group_or_default, named_error, normalize_email, unauthorized, unexpected_failure};
use types::{GetDataRequest, GetDataResponse, UpdateDataRequest};

/// Outcome of the password-challenge step shared by fetch and replace.
enum PasswordCheck {
    Verified,
    Rejected(axum::response::Response),
}

async fn check_password_challenge(
    pool: &PgPool,
    state: &AuthState,
    record: &DeviceAuthRecord,
    blob: &str,
    response: Option<&str>,
) -> PasswordCheck {
    if let Some(seconds) = record.blocked_remaining_seconds {
        return PasswordCheck::Rejected(
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "blocked", "blockedUntilSeconds": seconds })),
            )
                .into_response(),
        );
    }

    let Some(response) = response.map(str::trim).filter(|r| !r.is_empty()) else {
        return PasswordCheck::Rejected(unauthorized());
    };

    match verify_password_challenge_response(blob, response) {
        Ok(true) => {
            if record.password_challenge_error_count > 0 {
                if let Err(err) = clear_password_failures(pool, record.device_id).await {
                    error!("Failed to clear password failures: {err}");
                }
            }
            PasswordCheck::Verified
        }
        // A garbled answer counts as a wrong answer; only a broken stored
        // blob is a server-side problem.
        Ok(false) | Err(ChallengeError::InvalidEncoding) => {
            match register_password_failure(pool, record.device_id, state.lockout()).await {
                Ok(error_count) => {
                    error!(
                        device_id = record.device_id,
                        error_count, "password challenge failed"
                    );
                }
                Err(err) => error!("Failed to register password failure: {err}"),
            }
            PasswordCheck::Rejected(unauthorized())
        }
        Err(err) => {
            error!("Failed to verify password challenge: {err}");
            PasswordCheck::Rejected(unexpected_failure())
        }
    }
}

#[utoipa::path(
    post,
    path = "/get-data",
    request_body = GetDataRequest,
    responses(
        (status = 200, description = "Encrypted vault blob", body = GetDataResponse),
        (status = 401, description = "Unknown device or failed credential"),
        (status = 403, description = "Challenge round trip required, or device blocked"),
        (status = 404, description = "Account holds no vault data yet")
    ),
    tag = "vault"
)]
pub async fn get_data(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GetDataRequest>>,
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

    let record = match require_device(
        &pool,
        &auth_state,
        group_id,
        &email,
        &device_unique_id,
        request.device_access_code.as_deref(),
        request.device_challenge_response.as_deref(),
    )
    .await
    {
        Ok(record) => record,
        Err(response) => return response,
    };

    let Some(blob) = record
        .encrypted_data
        .clone()
        .filter(|blob| !blob.is_empty())
    else {
        return named_error(StatusCode::NOT_FOUND, "empty_data");
    };

    match check_password_challenge(
        &pool,
        &auth_state,
        &record,
        &blob,
        request.password_challenge_response.as_deref(),
    )
    .await
    {
        PasswordCheck::Verified => (
            StatusCode::OK,
            Json(GetDataResponse {
                encrypted_data: blob,
            }),
        )
            .into_response(),
        PasswordCheck::Rejected(response) => response,
    }
}

#[utoipa::path(
    post,
    path = "/update-data",
    request_body = UpdateDataRequest,
    responses(
        (status = 200, description = "Vault blob replaced"),
        (status = 401, description = "Unknown device, failed credential, or malformed blob"),
        (status = 403, description = "Challenge round trip required, or device blocked")
    ),
    tag = "vault"
)]
pub async fn update_data(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateDataRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let new_blob = request.encrypted_data.trim().to_string();
    if email.is_empty() || device_unique_id.is_empty() || new_blob.is_empty() {
        return unauthorized();
    }
    // Reject blobs a later password challenge could not be derived from.
    if derive_password_challenge(&new_blob).is_err() {
        return unauthorized();
    }

    let record = match require_device(
        &pool,
        &auth_state,
        group_id,
        &email,
        &device_unique_id,
        request.device_access_code.as_deref(),
        request.device_challenge_response.as_deref(),
    )
    .await
    {
        Ok(record) => record,
        Err(response) => return response,
    };

    // First upload has nothing to prove the password against; afterwards a
    // correct answer for the *current* blob is required to replace it.
    if let Some(existing) = record
        .encrypted_data
        .clone()
        .filter(|blob| !blob.is_empty())
    {
        match check_password_challenge(
            &pool,
            &auth_state,
            &record,
            &existing,
            request.password_challenge_response.as_deref(),
        )
        .await
        {
            PasswordCheck::Verified => {}
            PasswordCheck::Rejected(response) => return response,
        }
    }

    match storage::replace_vault_data(&pool, record.user_id, &new_blob).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!("Failed to replace vault data: {err}");
            unexpected_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoLockout};
    use super::{get_data, update_data, GetDataRequest, UpdateDataRequest};
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
    async fn get_data_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_data(None, Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_data_rejects_unparseable_blob() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = update_data(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(UpdateDataRequest {
                user_email: "alice@example.com".to_string(),
                device_id: "d1".to_string(),
                device_access_code: None,
                device_challenge_response: None,
                password_challenge_response: None,
                encrypted_data: "not-a-vault-blob".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn get_data_rejects_blank_identity() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_data(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(GetDataRequest {
                user_email: String::new(),
                device_id: "d1".to_string(),
                device_access_code: None,
                device_challenge_response: None,
                password_challenge_response: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
