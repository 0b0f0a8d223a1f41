//! Database helpers for the authentication gate and challenge lifecycle.
//!
//! Expirations are compared against `NOW()` inside the statements so that
//! checks and the conditional updates that consume state agree on the clock.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::lockout::LockoutPolicy;

/// Row backing `get_authentication_challenges`.
pub(crate) struct GateRecord {
    pub(crate) device_id: i64,
    pub(crate) authorization_status: String,
    pub(crate) has_access_code_hash: bool,
    pub(crate) has_device_public_key: bool,
    pub(crate) encrypted_data: Option<String>,
}

/// Credential record for an `AUTHORIZED` device, loaded once per request.
#[derive(Debug)]
pub(crate) struct DeviceAuthRecord {
    pub(crate) device_id: i64,
    pub(crate) user_id: i64,
    pub(crate) group_id: i64,
    pub(crate) email: String,
    pub(crate) access_code_hash: Option<String>,
    pub(crate) device_public_key: Option<String>,
    pub(crate) session_auth_challenge: Option<String>,
    pub(crate) challenge_expired: bool,
    pub(crate) encrypted_data: Option<String>,
    pub(crate) encrypted_password_backup: Option<String>,
    pub(crate) password_challenge_error_count: i32,
    pub(crate) blocked_remaining_seconds: Option<i64>,
}

pub(crate) async fn lookup_gate_record(
    pool: &PgPool,
    email: &str,
    device_unique_id: &str,
    group_id: i64,
) -> Result<Option<GateRecord>> {
    let query = r"
        SELECT
            ud.id AS device_id,
            ud.authorization_status,
            COALESCE(char_length(ud.access_code_hash), 0) > 0 AS has_access_code_hash,
            COALESCE(char_length(ud.device_public_key), 0) > 0 AS has_device_public_key,
            u.encrypted_data
        FROM user_devices AS ud
        JOIN users AS u ON ud.user_id = u.id
        WHERE u.email = $1
          AND ud.device_unique_id = $2
          AND u.group_id = $3
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
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup gate record")?;

    Ok(row.map(|row| GateRecord {
        device_id: row.get("device_id"),
        authorization_status: row.get("authorization_status"),
        has_access_code_hash: row.get("has_access_code_hash"),
        has_device_public_key: row.get("has_device_public_key"),
        encrypted_data: row.get("encrypted_data"),
    }))
}

/// Recorded old-to-new email migration for the group, if any.
pub(crate) async fn lookup_email_migration(
    pool: &PgPool,
    old_email: &str,
    group_id: i64,
) -> Result<Option<String>> {
    let query = r"
        SELECT new_email
        FROM changed_emails
        WHERE old_email = $1 AND group_id = $2
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(old_email)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup email migration")?;
    Ok(row.map(|row| row.get("new_email")))
}

pub(crate) async fn lookup_device_auth(
    pool: &PgPool,
    email: &str,
    device_unique_id: &str,
    group_id: i64,
) -> Result<Option<DeviceAuthRecord>> {
    let query = r"
        SELECT
            ud.id AS device_id,
            u.id AS user_id,
            u.email,
            ud.access_code_hash,
            ud.device_public_key,
            ud.session_auth_challenge,
            COALESCE(ud.session_auth_challenge_exp_time <= NOW(), TRUE) AS challenge_expired,
            u.encrypted_data,
            ud.encrypted_password_backup,
            ud.password_challenge_error_count,
            CASE
                WHEN ud.password_challenge_blocked_until > NOW()
                THEN CEIL(EXTRACT(EPOCH FROM ud.password_challenge_blocked_until - NOW()))::BIGINT
            END AS blocked_remaining_seconds
        FROM user_devices AS ud
        JOIN users AS u ON ud.user_id = u.id
        WHERE u.email = $1
          AND ud.device_unique_id = $2
          AND ud.authorization_status = 'AUTHORIZED'
          AND ud.group_id = $3
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
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup device auth record")?;

    Ok(row.map(|row| DeviceAuthRecord {
        device_id: row.get("device_id"),
        user_id: row.get("user_id"),
        group_id,
        email: row.get("email"),
        access_code_hash: row.get("access_code_hash"),
        device_public_key: row.get("device_public_key"),
        session_auth_challenge: row.get("session_auth_challenge"),
        challenge_expired: row.get("challenge_expired"),
        encrypted_data: row.get("encrypted_data"),
        encrypted_password_backup: row.get("encrypted_password_backup"),
        password_challenge_error_count: row.get("password_challenge_error_count"),
        blocked_remaining_seconds: row.get("blocked_remaining_seconds"),
    }))
}

/// Store a fresh device challenge, overwriting any prior one.
///
/// Only the most recently issued challenge is ever valid; a concurrent
/// responder racing an overwrite simply loses.
pub(crate) async fn store_device_challenge(
    pool: &PgPool,
    device_id: i64,
    challenge: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        UPDATE user_devices
        SET session_auth_challenge = $2,
            session_auth_challenge_exp_time = NOW() + ($3 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(device_id)
        .bind(challenge)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store device challenge")?;
    Ok(())
}

/// Consume the pending challenge if it is still the one that was answered
/// and has not expired. Zero rows means consumed, overwritten, or expired.
pub(crate) async fn consume_device_challenge(
    pool: &PgPool,
    device_id: i64,
    challenge: &str,
) -> Result<bool> {
    let query = r"
        UPDATE user_devices
        SET session_auth_challenge = NULL,
            session_auth_challenge_exp_time = NULL
        WHERE id = $1
          AND session_auth_challenge = $2
          AND session_auth_challenge_exp_time > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(device_id)
        .bind(challenge)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to consume device challenge")?;
    Ok(result.rows_affected() > 0)
}

/// Record one failed password-challenge attempt and apply the lockout policy.
///
/// Returns the new error count. The increment is a single statement so
/// concurrent failures each count exactly once.
pub(crate) async fn register_password_failure(
    pool: &PgPool,
    device_id: i64,
    policy: &dyn LockoutPolicy,
) -> Result<i32> {
    let query = r"
        UPDATE user_devices
        SET password_challenge_error_count = password_challenge_error_count + 1
        WHERE id = $1
        RETURNING password_challenge_error_count
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(device_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to increment password challenge error count")?;
    let error_count: i32 = row.get("password_challenge_error_count");

    if error_count >= policy.threshold() {
        let block_seconds =
            i64::try_from(policy.block_duration(error_count).as_secs()).unwrap_or(i64::MAX);
        let query = r"
            UPDATE user_devices
            SET password_challenge_blocked_until = NOW() + ($2 * INTERVAL '1 second')
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(device_id)
            .bind(block_seconds)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to set password challenge block")?;
    }

    Ok(error_count)
}

/// Reset the failure counter and any block, e.g. after a correct answer or a
/// successful backup recovery.
pub(crate) async fn clear_password_failures(pool: &PgPool, device_id: i64) -> Result<()> {
    let query = r"
        UPDATE user_devices
        SET password_challenge_error_count = 0,
            password_challenge_blocked_until = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(device_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear password challenge failures")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DeviceAuthRecord;

    #[test]
    fn device_auth_record_holds_values() {
        let record = DeviceAuthRecord {
            device_id: 1,
            user_id: 2,
            group_id: 1,
            email: "alice@example.com".to_string(),
            access_code_hash: None,
            device_public_key: Some("key".to_string()),
            session_auth_challenge: Some("challenge".to_string()),
            challenge_expired: false,
            encrypted_data: None,
            encrypted_password_backup: None,
            password_challenge_error_count: 0,
            blocked_remaining_seconds: None,
        };
        assert_eq!(record.device_id, 1);
        assert_eq!(record.email, "alice@example.com");
        assert!(!record.challenge_expired);
        assert!(record.blocked_remaining_seconds.is_none());
    }
}
