//! Transactional email outbox and delivery worker.
//!
//! Pairing emails are enqueued as `email_outbox` rows, in the same
//! transaction as the device upsert where atomicity matters. A background
//! task polls the table, locks a batch with `FOR UPDATE SKIP LOCKED`, and
//! hands each row to an [`EmailSender`]. Delivery is fire-and-forget from
//! the request's point of view: the HTTP response never waits on it, and
//! failures are logged and retried with exponential backoff plus jitter
//! until a max attempt threshold marks the row `failed`.
//!
//! The default sender logs instead of delivering; SMTP/API delivery is a
//! deployment concern implemented against the same trait.

use anyhow::{Context, Result};
use rand::Rng;
use sqlx::{PgExecutor, PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to schedule a retry.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email outbox send stub"
        );
        Ok(())
    }
}

/// Queue a message for asynchronous delivery.
///
/// Callers pass a transaction when the enqueue must commit atomically with
/// other rows (pairing upsert), or the pool for standalone sends (resends).
pub(crate) async fn enqueue<'e, E>(
    executor: E,
    to_email: &str,
    template: &str,
    payload: &serde_json::Value,
) -> Result<()>
where
    E: PgExecutor<'e>,
{
    let payload_text = serde_json::to_string(payload).context("failed to serialize email payload")?;
    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;
    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    /// Default worker config: 5s poll interval, 10 messages per batch,
    /// 5 max attempts, and 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    /// Clamp degenerate values so a zeroed config cannot spin or divide the
    /// backoff to nothing.
    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = self.batch_size.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = self.backoff_max.max(backoff_base);
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the background task that drains the outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            let batch_result = process_outbox_batch(&pool, sender.as_ref(), &config).await;
            if let Err(err) = batch_result {
                error!("email outbox batch failed: {err}");
            }

            sleep(poll_interval).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    // Grab a locked batch so multiple workers can run without double-sending.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(0))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let message = EmailMessage {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        let send_result = sender.send(&message);
        update_outbox_status(&mut tx, id, attempts, send_result, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn update_outbox_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &EmailWorkerConfig,
) -> Result<()> {
    let next_attempt = attempts.saturating_add(1);
    let next_attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);
    match send_result {
        Ok(()) => {
            let query = r"
                UPDATE email_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox status to sent")?;
        }
        Err(err) if next_attempt >= config.max_attempts() => {
            let query = r"
                UPDATE email_outbox
                SET status = 'failed',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .bind(err.to_string())
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox status to failed")?;
        }
        Err(err) => {
            let delay = backoff_delay(next_attempt, config.backoff_base(), config.backoff_max());
            let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
            let query = r"
                UPDATE email_outbox
                SET status = 'pending',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .bind(err.to_string())
                .bind(delay_ms)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox retry schedule")?;
        }
    }

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_messages() {
        let message = EmailMessage {
            to_email: "alice@example.com".to_string(),
            template: "device_request".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }

    #[test]
    fn config_normalize_clamps_degenerate_values() {
        let config = EmailWorkerConfig::new()
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .normalize();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert!(config.backoff_max() >= config.backoff_base());
    }

    #[test]
    fn backoff_grows_and_stays_bounded() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);
        for attempt in 1..=10 {
            let delay = backoff_delay(attempt, base, max);
            assert!(delay <= max, "attempt {attempt} exceeded max: {delay:?}");
        }
        // Jitter keeps at least half of the nominal delay.
        let first = backoff_delay(1, base, max);
        assert!(first >= Duration::from_millis(2500));
    }

    #[test]
    fn jitter_preserves_tiny_delays() {
        assert_eq!(jitter_delay(Duration::from_millis(1)), Duration::from_millis(1));
    }
}
