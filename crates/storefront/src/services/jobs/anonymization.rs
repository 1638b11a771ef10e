//! Anonymization of accounts whose grace period is over.
//!
//! Orders are kept for accounting; only their contact fields are scrubbed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use synclune_core::{Email, UserId};

use super::{Batch, JobError};
use crate::db::{UserRepository, carts, orders, user_sessions, users};
use crate::models::user::User;
use crate::services::email::EmailService;

/// Anonymize one batch of due accounts.
///
/// Accounts that fail are added to `failed` and not fetched again during
/// this run, so one bad row cannot stall the whole job.
pub async fn process_batch(
    pool: &PgPool,
    email: &EmailService,
    cutoff: DateTime<Utc>,
    limit: i64,
    failed: &mut Vec<UserId>,
) -> Result<Batch, JobError> {
    let due = UserRepository::new(pool)
        .due_for_anonymization(cutoff, limit, failed.as_slice())
        .await?;

    let mut batch = Batch {
        fetched: due.len() as u64,
        processed: 0,
    };
    for user in &due {
        match anonymize_user(pool, email, user).await {
            Ok(true) => batch.processed += 1,
            Ok(false) => {}
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Account anonymization failed");
                failed.push(user.id);
            }
        }
    }
    Ok(batch)
}

/// Anonymize one account, returning `false` if its deletion was cancelled
/// in the meantime.
///
/// Every open session of the account is deleted in the same transaction.
/// The farewell email uses the address read before the scrub and is only
/// sent once the scrub is committed.
///
/// # Errors
///
/// Returns `JobError::Repository` if the transaction fails; nothing is
/// changed in that case.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn anonymize_user(
    pool: &PgPool,
    email: &EmailService,
    user: &User,
) -> Result<bool, JobError> {
    let mut tx = pool.begin().await?;
    if users::lock_pending_deletion(&mut tx, user.id).await?.is_none() {
        tx.rollback().await?;
        info!("Deletion no longer pending, skipped");
        return Ok(false);
    }
    users::anonymize(&mut tx, user.id).await?;
    let sessions_revoked = user_sessions::revoke_all(&mut tx, user.id).await?;
    carts::delete_for_user(&mut tx, user.id).await?;
    let scrubbed =
        orders::scrub_for_user(&mut tx, user.id, &Email::anonymized(user.id.as_i32())).await?;
    tx.commit().await?;

    info!(orders_scrubbed = scrubbed, sessions_revoked, "Account anonymized");

    if let Err(e) = email
        .send_account_deleted(user.email.as_str(), &user.name)
        .await
    {
        warn!(error = %e, "Account deletion email failed");
    }
    Ok(true)
}
