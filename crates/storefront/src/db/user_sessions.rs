//! Sessions opened by each account.
//!
//! `tower_sessions.session` only knows opaque ids; this table ties them to a
//! user so every open session of an account can be dropped at once.

use sqlx::{PgConnection, PgPool};

use synclune_core::UserId;

use super::RepositoryError;

/// Attach a stored session to the account that just signed in.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails, including when
/// the session row was not saved yet.
pub async fn record(pool: &PgPool, user_id: UserId, session_id: &str) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO synclune.user_session (session_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (session_id) DO UPDATE SET user_id = EXCLUDED.user_id
        ",
    )
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete every stored session of an account. Returns the number dropped.
///
/// The link rows cascade with their sessions.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn revoke_all(conn: &mut PgConnection, user_id: UserId) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM tower_sessions.session
        WHERE id IN (
            SELECT session_id FROM synclune.user_session WHERE user_id = $1
        )
        ",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Number of sessions an account still has.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_for_user(pool: &PgPool, user_id: UserId) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM synclune.user_session WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
