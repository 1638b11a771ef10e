//! Release of orders whose payment never arrived.
//!
//! Stripe normally reports an expired session by webhook; this catches the
//! orders whose event was lost.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};

use synclune_core::PaymentStatus;

use super::{Batch, JobError};
use crate::db::orders;
use crate::models::order::Order;
use crate::services::stripe::StripeClient;

/// Age after which a pending order is given up.
pub const STALE_AFTER_HOURS: i64 = 24;

pub fn cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::hours(STALE_AFTER_HOURS)
}

/// Cancel one batch of stale orders and give back their stock and discount
/// slots. Provider cleanup happens after commit and is best effort.
pub async fn release_batch(
    pool: &PgPool,
    stripe: &StripeClient,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Batch, JobError> {
    let mut tx = pool.begin().await?;
    let stale = orders::lock_stale_pending(&mut tx, cutoff, limit).await?;

    let mut cancelled: Vec<Order> = Vec::with_capacity(stale.len());
    for order in &stale {
        if let Some(order) = orders::cancel_unpaid(&mut tx, order.id, PaymentStatus::Expired).await? {
            let released = orders::release_reservations(&mut tx, order.id).await?;
            info!(
                order_id = %order.id,
                units_restocked = released.units_restocked,
                discount_released = released.discount_released,
                "Stale order released"
            );
            cancelled.push(order);
        }
    }
    tx.commit().await?;

    for order in &cancelled {
        if let Some(session_id) = order.stripe_checkout_session_id.as_deref()
            && let Err(e) = stripe.expire_checkout_session(session_id).await
        {
            warn!(order_id = %order.id, error = %e, "Could not expire checkout session");
        }
        if let Some(coupon_id) = order.stripe_coupon_id.as_deref()
            && let Err(e) = stripe.delete_coupon(coupon_id).await
        {
            warn!(order_id = %order.id, error = %e, "Could not delete coupon");
        }
    }

    Ok(Batch {
        fetched: stale.len() as u64,
        processed: cancelled.len() as u64,
    })
}
