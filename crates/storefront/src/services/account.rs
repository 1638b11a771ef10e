//! Account lifecycle: deletion requests, data export and order history.
//!
//! A deletion request starts a grace period; the `process-account-deletions`
//! job anonymizes the account once it is over.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use synclune_core::{AccountStatus, UserId};

use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, BusinessError};
use crate::models::order::OrderWithItems;
use crate::models::user::User;
use crate::services::email::EmailService;

/// State of an account's deletion request.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionStatus {
    pub account_status: AccountStatus,
    pub deletion_requested_at: Option<DateTime<Utc>>,
    /// When anonymization becomes due.
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Everything stored about a customer.
#[derive(Debug, Clone, Serialize)]
pub struct AccountExport {
    pub exported_at: DateTime<Utc>,
    pub profile: User,
    pub orders: Vec<OrderWithItems>,
}

/// Date an account requested at `requested_at` becomes due for anonymization.
#[must_use]
pub fn anonymization_date(requested_at: DateTime<Utc>, grace_days: i64) -> DateTime<Utc> {
    requested_at + Duration::days(grace_days)
}

pub struct AccountService<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
    grace_days: i64,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, grace_days: i64) -> Self {
        Self {
            pool,
            email,
            grace_days,
        }
    }

    async fn user(&self, user_id: UserId) -> Result<User, AppError> {
        let user = UserRepository::new(self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account not found".to_string()))?;
        if user.account_status == AccountStatus::Anonymized {
            return Err(BusinessError::AccountClosed.into());
        }
        Ok(user)
    }

    fn status_of(&self, user: &User) -> DeletionStatus {
        DeletionStatus {
            account_status: user.account_status,
            deletion_requested_at: user.deletion_requested_at,
            scheduled_for: user
                .deletion_requested_at
                .map(|at| anonymization_date(at, self.grace_days)),
        }
    }

    /// Ask for the account to be deleted.
    ///
    /// Asking again while a request is pending changes nothing and sends no
    /// second email.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::AccountClosed` for an anonymized account.
    #[instrument(skip(self))]
    pub async fn request_deletion(&self, user_id: UserId) -> Result<DeletionStatus, AppError> {
        let user = self.user(user_id).await?;
        if user.account_status == AccountStatus::PendingDeletion {
            return Ok(self.status_of(&user));
        }

        let user = UserRepository::new(self.pool).request_deletion(user_id).await?;
        let status = self.status_of(&user);
        info!(scheduled_for = ?status.scheduled_for, "Account deletion requested");

        if let Some(scheduled_for) = status.scheduled_for
            && let Err(e) = self
                .email
                .send_deletion_requested(user.email.as_str(), &user.name, scheduled_for)
                .await
        {
            warn!(error = %e, "Deletion confirmation email failed");
        }
        Ok(status)
    }

    /// Withdraw a pending deletion request.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::NoPendingDeletion` if nothing is pending.
    #[instrument(skip(self))]
    pub async fn cancel_deletion(&self, user_id: UserId) -> Result<DeletionStatus, AppError> {
        self.user(user_id).await?;
        let users = UserRepository::new(self.pool);
        if !users.cancel_deletion(user_id).await? {
            return Err(BusinessError::NoPendingDeletion.into());
        }
        info!("Account deletion cancelled");

        let user = users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account not found".to_string()))?;
        Ok(self.status_of(&user))
    }

    /// Profile and full order history.
    ///
    /// # Errors
    ///
    /// Returns a database error if a query fails.
    #[instrument(skip(self))]
    pub async fn export(&self, user_id: UserId) -> Result<AccountExport, AppError> {
        let profile = self.user(user_id).await?;
        let orders = OrderRepository::new(self.pool).list_for_user(user_id).await?;
        info!(orders = orders.len(), "Account data exported");
        Ok(AccountExport {
            exported_at: Utc::now(),
            profile,
            orders,
        })
    }

    /// Orders of the account, newest first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn orders(&self, user_id: UserId) -> Result<Vec<OrderWithItems>, AppError> {
        Ok(OrderRepository::new(self.pool).list_for_user(user_id).await?)
    }
}
