//! Admin account management.
//!
//! Back-office staff sign in with a regular shop account. Promoting the
//! account gives it access to the back-office.
//!
//! # Usage
//!
//! ```bash
//! synclune-cli admin promote -e gerante@synclune.fr
//! synclune-cli admin demote -e ancien@synclune.fr
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string

use synclune_core::{Email, EmailError, UserRole};
use synclune_storefront::config::{ConfigError, get_database_url};
use synclune_storefront::db::{RepositoryError, UserRepository, create_pool};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No account with this email.
    #[error("No account found for {0}. The user must register on the shop first.")]
    UnknownUser(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Set the role of an existing account.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if nobody registered with this email.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email)?;
    let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownUser(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(())
}
