//! Database helpers for the pairing state machine.
//!
//! The PENDING -> AUTHORIZED transition and the PENDING refresh are single
//! conditional statements, so two concurrent requests can never both take
//! the same transition.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use crate::api::email;

const PAIRING_EMAIL_TEMPLATE: &str = "device_request";

/// Current pairing state of a device row.
pub(crate) struct DeviceRequest {
    pub(crate) authorization_status: String,
    pub(crate) authorization_code: Option<String>,
    pub(crate) code_expired: bool,
    pub(crate) code_expiration: Option<DateTime<Utc>>,
}

/// Device metadata captured at pairing time, echoed into the pairing email.
pub(crate) struct DeviceMeta<'a> {
    pub(crate) device_name: Option<&'a str>,
    pub(crate) device_type: Option<&'a str>,
    pub(crate) device_os: Option<&'a str>,
    pub(crate) app_version: Option<&'a str>,
    pub(crate) device_public_key: Option<&'a str>,
}

pub(crate) async fn lookup_user_id(
    pool: &PgPool,
    email: &str,
    group_id: i64,
) -> Result<Option<i64>> {
    let query = "SELECT id FROM users WHERE email = $1 AND group_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;
    Ok(row.map(|row| row.get("id")))
}

pub(crate) async fn fetch_allowed_patterns(pool: &PgPool, group_id: i64) -> Result<Vec<String>> {
    let query = "SELECT pattern FROM allowed_emails WHERE group_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(group_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch allowed email patterns")?;
    Ok(rows.into_iter().map(|row| row.get("pattern")).collect())
}

/// Create the user on first allowed pairing request.
///
/// A concurrent creation is fine: the conflict arm falls back to the
/// existing row.
pub(crate) async fn insert_user(pool: &PgPool, email: &str, group_id: i64) -> Result<i64> {
    let query = r"
        INSERT INTO users (email, group_id)
        VALUES ($1, $2)
        ON CONFLICT (email, group_id) DO NOTHING
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to insert user")?;

    if let Some(row) = row {
        return Ok(row.get("id"));
    }
    lookup_user_id(pool, email, group_id)
        .await?
        .context("user row vanished after conflicting insert")
}

pub(crate) async fn lookup_device_request(
    pool: &PgPool,
    user_id: i64,
    device_unique_id: &str,
    group_id: i64,
) -> Result<Option<DeviceRequest>> {
    let query = r"
        SELECT
            authorization_status,
            authorization_code,
            COALESCE(auth_code_expiration_date <= NOW(), TRUE) AS code_expired,
            auth_code_expiration_date
        FROM user_devices
        WHERE user_id = $1 AND device_unique_id = $2 AND group_id = $3
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(device_unique_id)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup device request")?;

    Ok(row.map(|row| DeviceRequest {
        authorization_status: row.get("authorization_status"),
        authorization_code: row.get("authorization_code"),
        code_expired: row.get("code_expired"),
        code_expiration: row.get("auth_code_expiration_date"),
    }))
}

/// Upsert the device as PENDING with a fresh code and enqueue the pairing
/// email, atomically.
///
/// The conflict arm only fires while the row is still PENDING, so an
/// `AUTHORIZED` or revoked device is never clobbered by a re-request racing
/// a confirmation; that case returns `Ok(None)`.
pub(crate) async fn upsert_pending_device(
    pool: &PgPool,
    user_id: i64,
    group_id: i64,
    email: &str,
    device_unique_id: &str,
    meta: &DeviceMeta<'_>,
    access_code_hash: &str,
    authorization_code: &str,
    code_ttl_seconds: i64,
) -> Result<Option<DateTime<Utc>>> {
    let mut tx = pool.begin().await.context("begin pairing transaction")?;

    let query = r"
        INSERT INTO user_devices
            (user_id, group_id, device_unique_id, device_name, device_type,
             os_version, app_version, access_code_hash, device_public_key,
             authorization_status, authorization_code, auth_code_expiration_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                'PENDING', $10, NOW() + ($11 * INTERVAL '1 second'))
        ON CONFLICT (user_id, device_unique_id, group_id) DO UPDATE
        SET device_name = EXCLUDED.device_name,
            access_code_hash = EXCLUDED.access_code_hash,
            device_public_key = COALESCE(EXCLUDED.device_public_key, user_devices.device_public_key),
            authorization_status = 'PENDING',
            authorization_code = EXCLUDED.authorization_code,
            auth_code_expiration_date = EXCLUDED.auth_code_expiration_date,
            updated_at = NOW()
        WHERE user_devices.authorization_status = 'PENDING'
        RETURNING auth_code_expiration_date
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(group_id)
        .bind(device_unique_id)
        .bind(meta.device_name)
        .bind(meta.device_type)
        .bind(meta.device_os)
        .bind(meta.app_version)
        .bind(access_code_hash)
        .bind(meta.device_public_key)
        .bind(authorization_code)
        .bind(code_ttl_seconds)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to upsert pending device")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(None);
    };
    let expiration: DateTime<Utc> = row.get("auth_code_expiration_date");

    email::enqueue(
        &mut *tx,
        email,
        PAIRING_EMAIL_TEMPLATE,
        &pairing_email_payload(email, meta, authorization_code, expiration),
    )
    .await?;

    tx.commit().await.context("commit pairing transaction")?;
    Ok(Some(expiration))
}

/// Re-enqueue the pairing email for a still-valid PENDING request, carrying
/// the stored code unchanged.
pub(crate) async fn resend_pairing_email(
    pool: &PgPool,
    email: &str,
    meta: &DeviceMeta<'_>,
    authorization_code: &str,
    expiration: Option<DateTime<Utc>>,
) -> Result<()> {
    let expiration = expiration.unwrap_or_else(Utc::now);
    email::enqueue(
        pool,
        email,
        PAIRING_EMAIL_TEMPLATE,
        &pairing_email_payload(email, meta, authorization_code, expiration),
    )
    .await
}

fn pairing_email_payload(
    email: &str,
    meta: &DeviceMeta<'_>,
    authorization_code: &str,
    expiration: DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "email": email,
        "deviceName": meta.device_name,
        "deviceType": meta.device_type,
        "deviceOs": meta.device_os,
        "pairingCode": authorization_code,
        "expiresAt": expiration.to_rfc3339(),
    })
}

/// Row backing a confirmation attempt; only found while the code matches a
/// PENDING device.
pub(crate) struct ConfirmationRecord {
    pub(crate) device_id: i64,
    pub(crate) access_code_hash: Option<String>,
    pub(crate) code_expired: bool,
}

pub(crate) async fn lookup_confirmation(
    pool: &PgPool,
    email: &str,
    device_unique_id: &str,
    authorization_code: &str,
    group_id: i64,
) -> Result<Option<ConfirmationRecord>> {
    let query = r"
        SELECT
            ud.id AS device_id,
            ud.access_code_hash,
            COALESCE(ud.auth_code_expiration_date <= NOW(), TRUE) AS code_expired
        FROM user_devices AS ud
        JOIN users AS u ON ud.user_id = u.id
        WHERE u.email = $1
          AND ud.device_unique_id = $2
          AND ud.authorization_status = 'PENDING'
          AND ud.authorization_code = $3
          AND u.group_id = $4
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(device_unique_id)
        .bind(authorization_code)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup confirmation")?;

    Ok(row.map(|row| ConfirmationRecord {
        device_id: row.get("device_id"),
        access_code_hash: row.get("access_code_hash"),
        code_expired: row.get("code_expired"),
    }))
}

/// Flip PENDING -> AUTHORIZED and clear the code in one statement.
///
/// The predicate re-matches the code, so the second of two concurrent
/// confirmations affects zero rows and fails like any wrong code.
pub(crate) async fn finalize_authorization(
    pool: &PgPool,
    device_id: i64,
    authorization_code: &str,
) -> Result<bool> {
    let query = r"
        UPDATE user_devices
        SET authorization_status = 'AUTHORIZED',
            authorization_code = NULL,
            auth_code_expiration_date = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND authorization_status = 'PENDING'
          AND authorization_code = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(device_id)
        .bind(authorization_code)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to finalize authorization")?;
    Ok(result.rows_affected() > 0)
}
