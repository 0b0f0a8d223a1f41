//! Device management: listing, user-side revocation, renaming.
//!
//! All three sit behind the device gate; a device cannot manage the fleet
//! without first proving itself like any other sensitive request.

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
use super::auth::AuthState;
use super::{group_or_default, normalize_email, unauthorized, unexpected_failure};
use types::{
    AuthorizedDevicesResponse, GetAuthorizedDevicesRequest, RemoveAuthorizationRequest,
    RenameDeviceRequest,
};

#[utoipa::path(
    post,
    path = "/get-authorized-devices",
    request_body = GetAuthorizedDevicesRequest,
    responses(
        (status = 200, description = "Devices paired to the account", body = AuthorizedDevicesResponse),
        (status = 401, description = "Unknown device or failed credential"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "devices"
)]
pub async fn get_authorized_devices(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GetAuthorizedDevicesRequest>>,
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

    match storage::list_devices(&pool, record.user_id, group_id).await {
        Ok(devices) => (StatusCode::OK, Json(AuthorizedDevicesResponse { devices })).into_response(),
        Err(err) => {
            error!("Failed to list devices: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/remove-authorization",
    request_body = RemoveAuthorizationRequest,
    responses(
        (status = 200, description = "Device revoked"),
        (status = 401, description = "Unknown device, failed credential, or already revoked"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "devices"
)]
pub async fn remove_authorization(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RemoveAuthorizationRequest>>,
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

    match storage::revoke_device(&pool, record.user_id, group_id, request.device_to_remove_id).await
    {
        Ok(true) => StatusCode::OK.into_response(),
        // Not this user's device, or already in a terminal state.
        Ok(false) => unauthorized(),
        Err(err) => {
            error!("Failed to revoke device: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/rename-device",
    request_body = RenameDeviceRequest,
    responses(
        (status = 200, description = "Device renamed"),
        (status = 401, description = "Unknown device or failed credential"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "devices"
)]
pub async fn rename_device(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RenameDeviceRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let new_name = request.new_name.trim().to_string();
    if email.is_empty() || device_unique_id.is_empty() || new_name.is_empty() {
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

    match storage::rename_device(
        &pool,
        record.user_id,
        group_id,
        request.device_to_rename_id,
        &new_name,
    )
    .await
    {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => unauthorized(),
        Err(err) => {
            error!("Failed to rename device: {err}");
            unexpected_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoLockout};
    use super::{get_authorized_devices, rename_device, RenameDeviceRequest};
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
    async fn get_authorized_devices_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_authorized_devices(None, Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn rename_device_rejects_blank_name() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = rename_device(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RenameDeviceRequest {
                user_email: "alice@example.com".to_string(),
                device_id: "d1".to_string(),
                device_access_code: None,
                device_challenge_response: None,
                device_to_rename_id: 1,
                new_name: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
