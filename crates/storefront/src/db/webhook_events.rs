//! Webhook event repository: idempotency ledger for provider notifications.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use synclune_core::{WebhookEventId, WebhookEventStatus};

use super::RepositoryError;
use crate::models::webhook::WebhookEvent;

/// Repository for webhook event database operations.
pub struct WebhookEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WebhookEventRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an event as `processing`, or claim an existing unsettled one.
    ///
    /// Returns `None` when the event was already processed or skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn begin(
        &self,
        stripe_event_id: &str,
        event_type: &str,
    ) -> Result<Option<WebhookEvent>, RepositoryError> {
        let event = sqlx::query_as::<_, WebhookEvent>(
            r"
            INSERT INTO synclune.webhook_event (stripe_event_id, event_type, status, attempts)
            VALUES ($1, $2, 'processing', 1)
            ON CONFLICT (stripe_event_id) DO UPDATE
                SET status = 'processing',
                    attempts = synclune.webhook_event.attempts + 1,
                    error_message = NULL
                WHERE synclune.webhook_event.status NOT IN ('processed', 'skipped')
            RETURNING *
            ",
        )
        .bind(stripe_event_id)
        .bind(event_type)
        .fetch_optional(self.pool)
        .await?;

        Ok(event)
    }

    /// Store the outcome of a handled event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn finish(
        &self,
        id: WebhookEventId,
        status: WebhookEventStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE synclune.webhook_event
            SET status = $2, error_message = $3, processed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete up to `limit` settled events received before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM synclune.webhook_event
            WHERE id IN (
                SELECT id FROM synclune.webhook_event
                WHERE received_at < $1 AND status IN ('processed', 'skipped', 'failed')
                ORDER BY received_at
                LIMIT $2
            )
            ",
        )
        .bind(cutoff)
        .bind(limit)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Most recent events, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(
        &self,
        status: Option<WebhookEventStatus>,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, RepositoryError> {
        let events = sqlx::query_as::<_, WebhookEvent>(
            r"
            SELECT * FROM synclune.webhook_event
            WHERE ($1::synclune.webhook_event_status IS NULL OR status = $1)
            ORDER BY received_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(events)
    }
}
