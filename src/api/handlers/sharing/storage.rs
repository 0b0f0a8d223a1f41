//! Database helpers for shared-item authorization.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::types::SharedItemContact;

/// Is the user a recipient of the shared item at all?
pub(crate) async fn is_recipient(
    pool: &PgPool,
    item_id: i64,
    user_id: i64,
    group_id: i64,
) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM shared_account_users
        WHERE shared_account_id = $1 AND user_id = $2 AND group_id = $3
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(item_id)
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check shared item membership")?;
    Ok(row.is_some())
}

/// Recipients of the shared item, excluding the caller's own address.
pub(crate) async fn list_contacts(
    pool: &PgPool,
    item_id: i64,
    group_id: i64,
    caller_email: &str,
) -> Result<Vec<SharedItemContact>> {
    let query = r"
        SELECT u.id, u.email, sau.is_manager
        FROM users AS u
        JOIN shared_account_users AS sau ON sau.user_id = u.id
        WHERE sau.shared_account_id = $1
          AND u.group_id = $2
          AND u.email != $3
        ORDER BY u.email ASC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(item_id)
        .bind(group_id)
        .bind(caller_email)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list shared item contacts")?;

    Ok(rows
        .into_iter()
        .map(|row| SharedItemContact {
            id: row.get("id"),
            email: row.get("email"),
            is_manager: row.get("is_manager"),
        })
        .collect())
}

/// Remove the caller from a shared item, but only while at least one other
/// manager remains.
///
/// The manager count lives inside the delete predicate, so two members
/// leaving concurrently cannot strand the item without a manager.
pub(crate) async fn leave_shared_item(
    pool: &PgPool,
    item_id: i64,
    user_id: i64,
    group_id: i64,
) -> Result<bool> {
    let query = r"
        DELETE FROM shared_account_users
        WHERE shared_account_id = $1
          AND user_id = $2
          AND group_id = $3
          AND EXISTS (
              SELECT 1
              FROM shared_account_users AS other
              WHERE other.shared_account_id = $1
                AND other.group_id = $3
                AND other.user_id != $2
                AND other.is_manager
          )
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(item_id)
        .bind(user_id)
        .bind(group_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to leave shared item")?;
    Ok(result.rows_affected() > 0)
}

/// A target address is shareable-to once it has a registered sharing key.
pub(crate) async fn has_sharing_key(
    pool: &PgPool,
    email: &str,
    group_id: i64,
) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM users
        WHERE email = $1 AND group_id = $2 AND sharing_public_key IS NOT NULL
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
        .bind(group_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check sharing key")?;
    Ok(row.is_some())
}
