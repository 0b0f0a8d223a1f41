//! Database helpers for reset-token redemption and backup escrow.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

/// Latest reset request for a device, classified for the error taxonomy.
pub(crate) struct ResetRequestRecord {
    pub(crate) id: i64,
    pub(crate) reset_token: Option<String>,
    pub(crate) token_expired: bool,
}

pub(crate) async fn store_password_backup(
    pool: &PgPool,
    device_id: i64,
    encrypted_password_backup: &str,
) -> Result<()> {
    let query = r"
        UPDATE user_devices
        SET encrypted_password_backup = $2,
            updated_at = NOW()
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
        .bind(encrypted_password_backup)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store password backup")?;
    Ok(())
}

pub(crate) async fn lookup_reset_request(
    pool: &PgPool,
    device_id: i64,
) -> Result<Option<ResetRequestRecord>> {
    let query = r"
        SELECT
            id,
            reset_token,
            COALESCE(reset_token_expiration_date <= NOW(), TRUE) AS token_expired
        FROM password_reset_request
        WHERE device_id = $1
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(device_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup reset request")?;

    Ok(row.map(|row| ResetRequestRecord {
        id: row.get("id"),
        reset_token: row.get("reset_token"),
        token_expired: row.get("token_expired"),
    }))
}

/// Delete the reset request if the token still matches and has not expired.
///
/// Single use comes from the predicate: the second of two concurrent
/// redemptions deletes zero rows.
pub(crate) async fn consume_reset_request(
    pool: &PgPool,
    request_id: i64,
    reset_token: &str,
) -> Result<bool> {
    let query = r"
        DELETE FROM password_reset_request
        WHERE id = $1
          AND reset_token = $2
          AND reset_token_expiration_date > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(request_id)
        .bind(reset_token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to consume reset request")?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::ResetRequestRecord;

    #[test]
    fn reset_request_record_holds_values() {
        let record = ResetRequestRecord {
            id: 9,
            reset_token: Some("token".to_string()),
            token_expired: false,
        };
        assert_eq!(record.id, 9);
        assert_eq!(record.reset_token.as_deref(), Some("token"));
        assert!(!record.token_expired);
    }
}
