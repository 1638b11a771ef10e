//! Database operations for the Synclune `PostgreSQL` schema.
//!
//! # Schema: `synclune`
//!
//! ## Tables
//!
//! - `user` - Customer and admin accounts, GDPR lifecycle fields
//! - `product`, `product_sku`, `sku_media` - Catalog
//! - `cart`, `cart_item` - Carts keyed by user or anonymous session id
//! - `order`, `order_item` - Orders with denormalized line snapshots
//! - `discount`, `discount_usage` - Promo codes and point-in-time usage records
//! - `refund`, `refund_item` - Back-office refunds
//! - `webhook_event` - Inbound Stripe notifications (idempotency + audit)
//! - `user_session` - Session ids per account, for revocation
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p synclune-cli -- migrate
//! ```

pub mod carts;
pub mod discounts;
pub mod orders;
pub mod products;
pub mod refunds;
pub mod user_sessions;
pub mod users;
pub mod webhook_events;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use discounts::DiscountRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use refunds::RefundRepository;
pub use users::UserRepository;
pub use webhook_events::WebhookEventRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` so user text can be embedded in an `ILIKE` pattern.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `%text%` pattern for a contains-search, with wildcards escaped.
#[must_use]
pub fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("bague"), "bague");
        assert_eq!(escape_like("100%_or\\"), "100\\%\\_or\\\\");
    }

    #[test]
    fn test_contains_pattern_trims() {
        assert_eq!(contains_pattern("  perle "), "%perle%");
    }
}
