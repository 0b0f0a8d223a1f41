//! Shared-item authorization, downstream of the device gate.
//!
//! Every operation re-uses the authenticated user/device/group triple; the
//! only sharing-specific rules are recipient membership and the
//! at-least-one-manager invariant.

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
    CheckEmailForSharingRequest, GetContactsForSharedItemRequest, ShareableResponse,
    SharedItemContactsResponse, StopReceivingSharingRequest,
};

#[utoipa::path(
    post,
    path = "/get-contacts-for-shared-item",
    request_body = GetContactsForSharedItemRequest,
    responses(
        (status = 200, description = "Other recipients of the item", body = SharedItemContactsResponse),
        (status = 401, description = "Failed credential or caller is not a recipient"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "sharing"
)]
pub async fn get_contacts_for_shared_item(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GetContactsForSharedItemRequest>>,
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

    match storage::is_recipient(&pool, request.item_id, record.user_id, group_id).await {
        Ok(true) => {}
        Ok(false) => return unauthorized(),
        Err(err) => {
            error!("Failed to check shared item membership: {err}");
            return unexpected_failure();
        }
    }

    match storage::list_contacts(&pool, request.item_id, group_id, &record.email).await {
        Ok(contacts) => {
            (StatusCode::OK, Json(SharedItemContactsResponse { contacts })).into_response()
        }
        Err(err) => {
            error!("Failed to list shared item contacts: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/stop-receiving-sharing",
    request_body = StopReceivingSharingRequest,
    responses(
        (status = 200, description = "Caller removed from the item"),
        (status = 401, description = "Failed credential, or removal would leave no manager"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "sharing"
)]
pub async fn stop_receiving_sharing(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<StopReceivingSharingRequest>>,
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

    match storage::leave_shared_item(&pool, request.item_id, record.user_id, group_id).await {
        Ok(true) => StatusCode::OK.into_response(),
        // Not a member, or the caller is the last manager; neither is
        // allowed to delete the row.
        Ok(false) => unauthorized(),
        Err(err) => {
            error!("Failed to leave shared item: {err}");
            unexpected_failure()
        }
    }
}

#[utoipa::path(
    post,
    path = "/check-email-for-sharing",
    request_body = CheckEmailForSharingRequest,
    responses(
        (status = 200, description = "Whether the target address can receive shares", body = ShareableResponse),
        (status = 401, description = "Failed credential"),
        (status = 403, description = "Challenge round trip required")
    ),
    tag = "sharing"
)]
pub async fn check_email_for_sharing(
    group: Option<Path<i64>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CheckEmailForSharingRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return unauthorized();
    };

    let group_id = group_or_default(group);
    let email = normalize_email(&request.user_email);
    let device_unique_id = request.device_id.trim().to_string();
    let target_email = normalize_email(&request.email_address);
    if email.is_empty() || device_unique_id.is_empty() || target_email.is_empty() {
        return unauthorized();
    }

    if let Err(response) = require_device(
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
        return response;
    }

    match storage::has_sharing_key(&pool, &target_email, group_id).await {
        Ok(valid) => (StatusCode::OK, Json(ShareableResponse { valid })).into_response(),
        Err(err) => {
            error!("Failed to check sharing key: {err}");
            unexpected_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoLockout};
    use super::{check_email_for_sharing, get_contacts_for_shared_item, CheckEmailForSharingRequest};
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
    async fn contacts_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response =
            get_contacts_for_shared_item(None, Extension(pool), Extension(auth_state()), None)
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn check_email_rejects_blank_target() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = check_email_for_sharing(
            None,
            Extension(pool),
            Extension(auth_state()),
            Some(Json(CheckEmailForSharingRequest {
                user_email: "alice@example.com".to_string(),
                device_id: "d1".to_string(),
                device_access_code: None,
                device_challenge_response: None,
                email_address: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
