//! Purges of rows nobody needs any more.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::{Batch, JobError};
use crate::db::{CartRepository, WebhookEventRepository};

/// Start of the window that is kept.
pub fn retention_cutoff(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub async fn delete_webhook_events(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Batch, JobError> {
    let deleted = WebhookEventRepository::new(pool)
        .delete_older_than(cutoff, limit)
        .await?;
    Ok(Batch::all(deleted))
}

/// Only anonymous carts expire; account carts live with the account.
pub async fn delete_expired_carts(pool: &PgPool, limit: i64) -> Result<Batch, JobError> {
    let deleted = CartRepository::new(pool).delete_expired(limit).await?;
    Ok(Batch::all(deleted))
}
