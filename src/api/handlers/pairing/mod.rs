//! Device pairing: access requests and out-of-band confirmation.
//!
//! A device moves `NONE -> PENDING -> AUTHORIZED`; the pairing code travels
//! only inside the email, never in an HTTP response. Re-requesting while a
//! code is still valid resends the same code instead of rotating it, so
//! client retries cannot spam fresh codes.

pub(crate) mod allowlist;
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
use uuid::Uuid;

use super::auth::{access_code, AuthState};
use super::{group_or_default, named_error, normalize_email, unauthorized, unexpected_failure, valid_email};
use types::{AuthorizationStatusResponse, CheckDeviceRequest, RequestAccessRequest};

const PAIRING_CODE_LEN: usize = 8;

/// Short, URL-safe one-time pairing code for the email.
fn generate_pairing_code() -> String {
    let mut buffer = Uuid::encode_buffer();
    Uuid::new_v4().simple().encode_lower(&mut buffer)[..PAIRING_CODE_LEN].to_string()
}

#[utoipa::path(
    post,
    path = "/request-access",
    request_body = RequestAccessRequest,
    responses(
        (status = 200, description = "Device already paired or pairing still pending", body = AuthorizationStatusResponse),
        (status = 204, description = "Pairing started; the code travels by email"),
        (status = 401, description = "Malformed request or email not allowed")
    ),
    tag = "pairing"
)]
pub async fn request_access(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestAccessRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    if !valid_email(&email) {
        return unauthorized();
    }
    let device_unique_id = request.device_id.trim().to_string();
    let device_access_code = request.device_access_code.trim().to_string();
    if device_unique_id.is_empty() || device_access_code.is_empty() {
        return unauthorized();
    }

    let meta = storage::DeviceMeta {
        device_name: request.device_name.as_deref(),
        device_type: request.device_type.as_deref(),
        device_os: request.device_os.as_deref(),
        app_version: request.app_version.as_deref(),
        device_public_key: request.device_public_key.as_deref(),
    };

    let user_id = match storage::lookup_user_id(&pool, &email, group_id).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            // First-time address: the allow-list decides whether a user may
            // be created at all.
            let patterns = match storage::fetch_allowed_patterns(&pool, group_id).await {
                Ok(patterns) => patterns,
                Err(err) => {
                    error!("Failed to fetch allowed emails: {err}");
                    return unexpected_failure();
                }
            };
            if !allowlist::email_allowed(&patterns, &email) {
                return named_error(StatusCode::UNAUTHORIZED, "email_address_not_allowed");
            }
            match storage::insert_user(&pool, &email, group_id).await {
                Ok(user_id) => user_id,
                Err(err) => {
                    error!("Failed to create user: {err}");
                    return unexpected_failure();
                }
            }
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return unexpected_failure();
        }
    };

    let existing = match storage::lookup_device_request(&pool, user_id, &device_unique_id, group_id)
        .await
    {
        Ok(existing) => existing,
        Err(err) => {
            error!("Failed to lookup device request: {err}");
            return unexpected_failure();
        }
    };

    if let Some(device) = &existing {
        if device.authorization_status == "AUTHORIZED" {
            // Idempotent re-request, e.g. after an app reinstall.
            return (
                StatusCode::OK,
                Json(AuthorizationStatusResponse {
                    authorization_status: "AUTHORIZED".to_string(),
                }),
            )
                .into_response();
        }
        if device.authorization_status == "PENDING" && !device.code_expired {
            if let Some(code) = device.authorization_code.as_deref() {
                if let Err(err) = storage::resend_pairing_email(
                    &pool,
                    &email,
                    &meta,
                    code,
                    device.code_expiration,
                )
                .await
                {
                    error!("Failed to enqueue pairing email resend: {err}");
                    return unexpected_failure();
                }
            }
            return (
                StatusCode::OK,
                Json(AuthorizationStatusResponse {
                    authorization_status: "PENDING".to_string(),
                }),
            )
                .into_response();
        }
    }

    // No device row, or a PENDING request whose code lapsed: start over with
    // a fresh hash, code, and expiration.
    let access_code_hash = match access_code::hash_access_code(&device_access_code).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash access code: {err}");
            return unexpected_failure();
        }
    };
    let authorization_code = generate_pairing_code();

    match storage::upsert_pending_device(
        &pool,
        user_id,
        group_id,
        &email,
        &device_unique_id,
        &meta,
        &access_code_hash,
        &authorization_code,
        auth_state.config().pairing_code_ttl_seconds(),
    )
    .await
    {
        // The row left PENDING between our read and the upsert; nothing was
        // changed and the caller can simply retry.
        Ok(None) => unauthorized(),
        Ok(Some(_expiration)) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to upsert pending device: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/check-device",
    request_body = CheckDeviceRequest,
    responses(
        (status = 200, description = "Device authorized"),
        (status = 401, description = "Unknown combination, wrong access code, or expired code")
    ),
    tag = "pairing"
)]
pub async fn check_device(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    payload: Option<Json<CheckDeviceRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let device_access_code = request.device_access_code.trim().to_string();
    let validation_code = request.device_validation_code.trim().to_string();
    if email.is_empty()
        || device_unique_id.is_empty()
        || device_access_code.is_empty()
        || validation_code.is_empty()
    {
        return unauthorized();
    }

    // Wrong email, wrong device, and wrong/consumed code are deliberately
    // indistinguishable from here on.
    let record = match storage::lookup_confirmation(
        &pool,
        &email,
        &device_unique_id,
        &validation_code,
        group_id,
    )
    .await
    {
        Ok(Some(record)) => record,
        Ok(None) => return unauthorized(),
        Err(err) => {
            error!("Failed to lookup pairing confirmation: {err}");
            return unexpected_failure();
        }
    };

    let stored_hash = record.access_code_hash.unwrap_or_default();
    match access_code::verify_access_code(&device_access_code, &stored_hash).await {
        Ok(true) => {}
        Ok(false) => return unauthorized(),
        Err(err) => {
            error!("Failed to verify access code: {err}");
            return unexpected_failure();
        }
    }

    if record.code_expired {
        // The caller proved the full request was right, so the expiry is
        // safe to reveal.
        return (StatusCode::UNAUTHORIZED, Json(json!({ "expired": true }))).into_response();
    }

    match storage::finalize_authorization(&pool, record.device_id, &validation_code).await {
        Ok(true) => StatusCode::OK.into_response(),
        // A concurrent confirmation won; the code is consumed.
        Ok(false) => unauthorized(),
        Err(err) => {
            error!("Failed to finalize authorization: {err}");
            unexpected_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoLockout};
    use super::{check_device, generate_pairing_code, request_access};
    use super::{CheckDeviceRequest, RequestAccessRequest};
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

    #[test]
    fn pairing_codes_are_short_and_url_safe() {
        let code = generate_pairing_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(code, generate_pairing_code());
    }

    #[tokio::test]
    async fn request_access_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_access(None, Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn request_access_rejects_malformed_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_access(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RequestAccessRequest {
                user_email: "not-an-email".to_string(),
                device_id: "d1".to_string(),
                device_access_code: "secret".to_string(),
                device_name: None,
                device_type: None,
                device_os: None,
                app_version: None,
                device_public_key: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn check_device_rejects_blank_fields() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = check_device(
            None,
            Extension(pool),
            Some(Json(CheckDeviceRequest {
                user_email: "alice@example.com".to_string(),
                device_id: "d1".to_string(),
                device_access_code: " ".to_string(),
                device_validation_code: "ab12cd34".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
