//! Buyer identity: who owns the cart being read or checked out.
//!
//! A logged-in user stored under `current_user` wins. Otherwise the buyer is
//! anonymous, identified by a UUID v4 kept in the session under
//! `cart_session_id` and created on first write.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tower_sessions::Session;
use tracing::{info, instrument};
use uuid::Uuid;

use synclune_core::{ProductStatus, UserId};

use crate::db::{CartRepository, RepositoryError, carts};
use crate::models::{CurrentUser, session_keys};

/// Days an anonymous cart survives without a write.
pub const ANONYMOUS_CART_TTL_DAYS: i64 = 30;

/// Maximum quantity of one SKU in a cart or an order.
pub const MAX_LINE_QUANTITY: i32 = 10;

/// Owner of a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerIdentity {
    Authenticated(UserId),
    Anonymous(String),
}

impl BuyerIdentity {
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Authenticated(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated(_) => None,
            Self::Anonymous(id) => Some(id),
        }
    }
}

/// Resolve the buyer, creating an anonymous cart id if there is none yet.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn resolve(session: &Session) -> Result<BuyerIdentity, tower_sessions::session::Error> {
    if let Some(identity) = peek(session).await? {
        return Ok(identity);
    }

    let id = Uuid::new_v4().to_string();
    session.insert(session_keys::CART_SESSION_ID, &id).await?;
    Ok(BuyerIdentity::Anonymous(id))
}

/// Resolve the buyer without creating anything.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn peek(session: &Session) -> Result<Option<BuyerIdentity>, tower_sessions::session::Error> {
    if let Some(user) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?
    {
        return Ok(Some(BuyerIdentity::Authenticated(user.id)));
    }

    let anonymous = session
        .get::<String>(session_keys::CART_SESSION_ID)
        .await?
        .filter(|id| Uuid::parse_str(id).is_ok())
        .map(BuyerIdentity::Anonymous);
    Ok(anonymous)
}

/// Expiry of an anonymous cart written at `now`.
#[must_use]
pub fn anonymous_cart_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(ANONYMOUS_CART_TTL_DAYS)
}

/// Quantity after merging a line into a cart that may already hold the SKU.
///
/// Capped at the stock on hand and at [`MAX_LINE_QUANTITY`].
#[must_use]
pub fn merge_quantities(existing: Option<i32>, incoming: i32, inventory: i32) -> i32 {
    existing
        .unwrap_or(0)
        .saturating_add(incoming)
        .min(inventory)
        .min(MAX_LINE_QUANTITY)
        .max(0)
}

/// Lines moved from the anonymous cart at login.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged_lines: usize,
    pub dropped_lines: usize,
}

/// Move the anonymous cart of this session into the user's cart.
///
/// The anonymous cart is deleted and its id removed from the session.
///
/// # Errors
///
/// Returns an error if a query or the session store fails.
#[instrument(skip(pool, session), fields(user_id = %user_id))]
pub async fn merge_on_login(
    pool: &PgPool,
    session: &Session,
    user_id: UserId,
) -> Result<MergeOutcome, MergeError> {
    let Some(session_id) = session
        .get::<String>(session_keys::CART_SESSION_ID)
        .await?
    else {
        return Ok(MergeOutcome::default());
    };

    let repo = CartRepository::new(pool);
    let Some(anonymous) = repo.find_for_session(&session_id).await? else {
        session
            .remove::<String>(session_keys::CART_SESSION_ID)
            .await?;
        return Ok(MergeOutcome::default());
    };
    let user_cart = repo.get_or_create_for_user(user_id).await?;

    let mut tx = pool.begin().await.map_err(RepositoryError::from)?;
    carts::lock(&mut tx, anonymous.id).await?;
    let incoming = carts::lines_in(&mut tx, anonymous.id).await?;
    let existing: HashMap<_, _> = carts::lines_in(&mut tx, user_cart.id)
        .await?
        .into_iter()
        .map(|line| (line.sku_id, line.quantity))
        .collect();

    let mut outcome = MergeOutcome::default();
    for line in incoming {
        let purchasable = line.sku_active && line.product_status == ProductStatus::Public;
        let quantity = merge_quantities(existing.get(&line.sku_id).copied(), line.quantity, line.inventory);
        if !purchasable || quantity == 0 {
            outcome.dropped_lines += 1;
            continue;
        }
        carts::upsert_item(&mut tx, user_cart.id, line.sku_id, quantity, line.price_at_add).await?;
        outcome.merged_lines += 1;
    }

    carts::delete(&mut tx, anonymous.id).await?;
    tx.commit().await.map_err(RepositoryError::from)?;

    session
        .remove::<String>(session_keys::CART_SESSION_ID)
        .await?;

    info!(
        merged = outcome.merged_lines,
        dropped = outcome.dropped_lines,
        "Anonymous cart merged"
    );
    Ok(outcome)
}

/// Errors merging carts.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_quantities() {
        assert_eq!(merge_quantities(Some(2), 3, 20), 5);
        assert_eq!(merge_quantities(None, 3, 20), 3);
    }

    #[test]
    fn test_merge_capped_by_inventory_and_line_max() {
        assert_eq!(merge_quantities(Some(4), 4, 6), 6);
        assert_eq!(merge_quantities(Some(8), 8, 50), MAX_LINE_QUANTITY);
        assert_eq!(merge_quantities(Some(1), 1, 0), 0);
    }

    #[test]
    fn test_identity_accessors() {
        let user = BuyerIdentity::Authenticated(UserId::new(4));
        assert_eq!(user.user_id(), Some(UserId::new(4)));
        assert_eq!(user.session_id(), None);

        let guest = BuyerIdentity::Anonymous("abc".to_string());
        assert_eq!(guest.user_id(), None);
        assert_eq!(guest.session_id(), Some("abc"));
    }

    #[test]
    fn test_anonymous_expiry_is_thirty_days() {
        let now = Utc::now();
        assert_eq!(anonymous_cart_expiry(now) - now, Duration::days(30));
    }
}
