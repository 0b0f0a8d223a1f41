//! Password-backup escrow and rate-limited recovery.
//!
//! The escrowed backup is only released against a valid, unexpired,
//! single-use reset token created by an out-of-band recovery flow. The
//! three rejection reasons are distinguishable because the caller has
//! already passed the device gate.

pub(crate) mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::gate::require_device;
use super::auth::storage::clear_password_failures;
use super::auth::AuthState;
use super::{group_or_default, named_error, normalize_email, unauthorized, unexpected_failure};
use types::{BackupPasswordRequest, GetPasswordBackupRequest, PasswordBackupResponse};

#[utoipa::path(
    post,
    path = "/backup-password",
    request_body = BackupPasswordRequest,
    responses(
        (status = 200, description = "Backup escrowed for this device"),
        (status = 401, description = "Unknown device or failed credential"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "recovery"
)]
pub async fn backup_password(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<BackupPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let backup = request.encrypted_password_backup.trim().to_string();
    if email.is_empty() || device_unique_id.is_empty() || backup.is_empty() {
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

    match storage::store_password_backup(&pool, record.device_id, &backup).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!("Failed to store password backup: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/get-password-backup",
    request_body = GetPasswordBackupRequest,
    responses(
        (status = 200, description = "Escrowed backup released", body = PasswordBackupResponse),
        (status = 401, description = "Failed credential, or no_request/bad_token/expired"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "recovery"
)]
pub async fn get_password_backup(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GetPasswordBackupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let reset_token = request.reset_token.trim().to_string();
    if email.is_empty() || device_unique_id.is_empty() || reset_token.is_empty() {
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

    let reset_request = match storage::lookup_reset_request(&pool, record.device_id).await {
        Ok(reset_request) => reset_request,
        Err(err) => {
            error!("Failed to lookup reset request: {err}");
            return unexpected_failure();
        }
    };

    let Some(reset_request) = reset_request else {
        return named_error(StatusCode::UNAUTHORIZED, "no_request");
    };
    if reset_request.reset_token.as_deref() != Some(reset_token.as_str()) {
        return named_error(StatusCode::UNAUTHORIZED, "bad_token");
    }
    if reset_request.token_expired {
        return named_error(StatusCode::UNAUTHORIZED, "expired");
    }

    match storage::consume_reset_request(&pool, reset_request.id, &reset_token).await {
        Ok(true) => {}
        // A concurrent redemption consumed it first.
        Ok(false) => return named_error(StatusCode::UNAUTHORIZED, "no_request"),
        Err(err) => {
            error!("Failed to consume reset request: {err}");
            return unexpected_failure();
        }
    }

    // Successful recovery proves current legitimate control, so any lockout
    // accumulated before the reset is cleared too.
    if let Err(err) = clear_password_failures(&pool, record.device_id).await {
        error!("Failed to clear password failures after reset: {err}");
    }

    (
        StatusCode::OK,
        Json(PasswordBackupResponse {
            encrypted_password_backup: record.encrypted_password_backup,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoLockout};
    use super::{backup_password, get_password_backup, GetPasswordBackupRequest};
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
    async fn backup_password_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = backup_password(None, Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn get_password_backup_requires_reset_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_password_backup(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(GetPasswordBackupRequest {
                user_email: "alice@example.com".to_string(),
                device_id: "d1".to_string(),
                device_access_code: None,
                device_challenge_response: None,
                reset_token: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
