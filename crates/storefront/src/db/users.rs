//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use synclune_core::{Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::user::User;

/// Display name written over anonymized accounts.
pub const ANONYMIZED_NAME: &str = "Utilisateur supprimé";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, email, name, password_hash, role, account_status, stripe_customer_id,
                   deletion_requested_at, anonymized_at, created_at, updated_at
            FROM synclune.user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, email, name, password_hash, role, account_status, stripe_customer_id,
                   deletion_requested_at, anonymized_at, created_at, updated_at
            FROM synclune.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Create a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            r"
            INSERT INTO synclune.user (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, name, password_hash, role, account_status, stripe_customer_id,
                      deletion_requested_at, anonymized_at, created_at, updated_at
            ",
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    pub async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            r"
            UPDATE synclune.user
            SET role = $2, updated_at = NOW()
            WHERE email = $1
            RETURNING id, email, name, password_hash, role, account_status, stripe_customer_id,
                      deletion_requested_at, anonymized_at, created_at, updated_at
            ",
        )
        .bind(email)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Move an active account to `pending_deletion`.
    ///
    /// Returns the account as stored afterwards; an account already pending
    /// keeps its original request date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn request_deletion(&self, id: UserId) -> Result<User, RepositoryError> {
        let updated = sqlx::query_as::<_, User>(
            r"
            UPDATE synclune.user
            SET account_status = 'pending_deletion',
                deletion_requested_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND account_status = 'active'
            RETURNING id, email, name, password_hash, role, account_status, stripe_customer_id,
                      deletion_requested_at, anonymized_at, created_at, updated_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(user) => Ok(user),
            None => self.get_by_id(id).await?.ok_or(RepositoryError::NotFound),
        }
    }

    /// Return a `pending_deletion` account to `active`.
    ///
    /// Returns `false` if the account was not pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel_deletion(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE synclune.user
            SET account_status = 'active', deletion_requested_at = NULL, updated_at = NOW()
            WHERE id = $1 AND account_status = 'pending_deletion'
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Accounts whose deletion request is older than `cutoff`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due_for_anonymization(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        exclude: &[UserId],
    ) -> Result<Vec<User>, RepositoryError> {
        let exclude: Vec<i32> = exclude.iter().map(UserId::as_i32).collect();
        let users = sqlx::query_as::<_, User>(
            r"
            SELECT id, email, name, password_hash, role, account_status, stripe_customer_id,
                   deletion_requested_at, anonymized_at, created_at, updated_at
            FROM synclune.user
            WHERE account_status = 'pending_deletion'
              AND deletion_requested_at < $1
              AND NOT (id = ANY($3))
            ORDER BY deletion_requested_at
            LIMIT $2
            ",
        )
        .bind(cutoff)
        .bind(limit)
        .bind(&exclude)
        .fetch_all(self.pool)
        .await?;

        Ok(users)
    }
}

/// Lock an account that is still waiting for anonymization.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_pending_deletion(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<User>, RepositoryError> {
    let user = sqlx::query_as::<_, User>(
        r"
        SELECT id, email, name, password_hash, role, account_status, stripe_customer_id,
               deletion_requested_at, anonymized_at, created_at, updated_at
        FROM synclune.user
        WHERE id = $1 AND account_status = 'pending_deletion'
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// Scrub the personal fields of an account and mark it anonymized.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the account does not exist.
pub async fn anonymize(conn: &mut PgConnection, id: UserId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE synclune.user
        SET email = $2,
            name = $3,
            password_hash = NULL,
            stripe_customer_id = NULL,
            account_status = 'anonymized',
            anonymized_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(Email::anonymized(id.as_i32()))
    .bind(ANONYMIZED_NAME)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
