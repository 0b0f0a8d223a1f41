//! Database helpers for device management.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::types::DeviceSummary;

pub(crate) async fn list_devices(
    pool: &PgPool,
    user_id: i64,
    group_id: i64,
) -> Result<Vec<DeviceSummary>> {
    let query = r"
        SELECT id, device_name, device_type, os_version, app_version, authorization_status
        FROM user_devices
        WHERE user_id = $1
          AND group_id = $2
          AND authorization_status IN ('PENDING', 'AUTHORIZED')
        ORDER BY created_at ASC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .bind(group_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list devices")?;

    Ok(rows
        .into_iter()
        .map(|row| DeviceSummary {
            id: row.get("id"),
            device_name: row.get("device_name"),
            device_type: row.get("device_type"),
            os_version: row.get("os_version"),
            app_version: row.get("app_version"),
            authorization_status: row.get("authorization_status"),
        })
        .collect())
}

/// Revoke one of the user's devices. Revocation is terminal, so the
/// predicate only matches non-revoked rows; revoking twice affects nothing.
pub(crate) async fn revoke_device(
    pool: &PgPool,
    user_id: i64,
    group_id: i64,
    device_row_id: i64,
) -> Result<bool> {
    let query = r"
        UPDATE user_devices
        SET authorization_status = 'REVOKED_BY_USER',
            authorization_code = NULL,
            auth_code_expiration_date = NULL,
            session_auth_challenge = NULL,
            session_auth_challenge_exp_time = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND user_id = $2
          AND group_id = $3
          AND authorization_status IN ('PENDING', 'AUTHORIZED')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(device_row_id)
        .bind(user_id)
        .bind(group_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke device")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn rename_device(
    pool: &PgPool,
    user_id: i64,
    group_id: i64,
    device_row_id: i64,
    new_name: &str,
) -> Result<bool> {
    let query = r"
        UPDATE user_devices
        SET device_name = $4,
            updated_at = NOW()
        WHERE id = $1
          AND user_id = $2
          AND group_id = $3
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(device_row_id)
        .bind(user_id)
        .bind(group_id)
        .bind(new_name)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rename device")?;
    Ok(result.rows_affected() > 0)
}
