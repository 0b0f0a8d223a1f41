//! Database helpers for vault data.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::Instrument;

/// Replace the user's vault blob wholesale. The blob is opaque to the
/// server; versioning/merging is the client's business.
pub(crate) async fn replace_vault_data(
    pool: &PgPool,
    user_id: i64,
    encrypted_data: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET encrypted_data = $2,
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
        .bind(user_id)
        .bind(encrypted_data)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to replace vault data")?;
    Ok(())
}
