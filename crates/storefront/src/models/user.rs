//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{AccountStatus, Email, UserId, UserRole};

/// A customer or back-office account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    /// Argon2 PHC string; `None` once anonymized.
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub account_status: AccountStatus,
    #[serde(skip)]
    pub stripe_customer_id: Option<String>,
    pub deletion_requested_at: Option<DateTime<Utc>>,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account can still sign in.
    #[must_use]
    pub fn can_login(&self) -> bool {
        self.account_status != AccountStatus::Anonymized && self.password_hash.is_some()
    }
}
