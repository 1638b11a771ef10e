//! Refund repository.
//!
//! Pending and completed refunds both count against what is still refundable;
//! failed and cancelled ones give their amount back.

use sqlx::{PgConnection, PgPool};

use synclune_core::{OrderId, OrderItemId, Price, RefundId, RefundReason, UserId};

use super::RepositoryError;
use crate::models::refund::{Refund, RefundItem};

/// Values of a new pending refund.
#[derive(Debug)]
pub struct NewRefund<'a> {
    pub order_id: OrderId,
    pub amount: Price,
    pub includes_shipping: bool,
    pub reason: RefundReason,
    pub restock: bool,
    pub note: Option<&'a str>,
    pub created_by: Option<UserId>,
}

/// Units of an order line already covered by committed refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct RefundedQuantity {
    pub order_item_id: OrderItemId,
    pub quantity: i64,
}

/// Repository for refund database operations.
pub struct RefundRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefundRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Refunds of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>, RepositoryError> {
        let refunds = sqlx::query_as::<_, Refund>(
            "SELECT * FROM synclune.refund WHERE order_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(refunds)
    }

    /// A refund by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: RefundId) -> Result<Option<Refund>, RepositoryError> {
        let refund = sqlx::query_as::<_, Refund>("SELECT * FROM synclune.refund WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(refund)
    }

    /// Lines of a refund.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, refund_id: RefundId) -> Result<Vec<RefundItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, refund_id).await
    }

    /// Record a provider failure on a pending refund.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no pending refund has this id.
    pub async fn mark_failed(&self, id: RefundId, reason: &str) -> Result<Refund, RepositoryError> {
        sqlx::query_as::<_, Refund>(
            r"
            UPDATE synclune.refund
            SET status = 'failed', failure_reason = $2, processed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Remember the provider refund of a refund the provider has not
    /// settled yet. The refund stays pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no pending refund has this id.
    pub async fn record_provider_id(
        &self,
        id: RefundId,
        stripe_refund_id: &str,
    ) -> Result<Refund, RepositoryError> {
        sqlx::query_as::<_, Refund>(
            r"
            UPDATE synclune.refund
            SET stripe_refund_id = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(stripe_refund_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Cancel a refund that was never sent to the provider.
    ///
    /// Returns `None` if the refund is not pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel_pending(&self, id: RefundId) -> Result<Option<Refund>, RepositoryError> {
        let refund = sqlx::query_as::<_, Refund>(
            r"
            UPDATE synclune.refund
            SET status = 'cancelled', processed_at = NOW()
            WHERE id = $1 AND status = 'pending' AND stripe_refund_id IS NULL
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(refund)
    }
}

/// Refunded units per order line, counting pending and completed refunds.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn refunded_quantities(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<RefundedQuantity>, RepositoryError> {
    let rows = sqlx::query_as::<_, RefundedQuantity>(
        r"
        SELECT ri.order_item_id, SUM(ri.quantity)::BIGINT AS quantity
        FROM synclune.refund_item ri
        JOIN synclune.refund r ON r.id = ri.refund_id
        WHERE r.order_id = $1 AND r.status IN ('pending', 'completed')
        GROUP BY ri.order_item_id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Total of pending and completed refunds on an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn committed_total(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Price, RepositoryError> {
    let total = sqlx::query_scalar::<_, Price>(
        r"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM synclune.refund
        WHERE order_id = $1 AND status IN ('pending', 'completed')
        ",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

/// Total of completed refunds on an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn completed_total(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Price, RepositoryError> {
    let total = sqlx::query_scalar::<_, Price>(
        r"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM synclune.refund
        WHERE order_id = $1 AND status = 'completed'
        ",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

/// Insert a pending refund.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert(conn: &mut PgConnection, new: &NewRefund<'_>) -> Result<Refund, RepositoryError> {
    let refund = sqlx::query_as::<_, Refund>(
        r"
        INSERT INTO synclune.refund (
            order_id, amount_cents, includes_shipping, reason, restock, note, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(new.order_id)
    .bind(new.amount)
    .bind(new.includes_shipping)
    .bind(new.reason)
    .bind(new.restock)
    .bind(new.note)
    .bind(new.created_by)
    .fetch_one(&mut *conn)
    .await?;

    Ok(refund)
}

/// Insert one refunded line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    refund_id: RefundId,
    order_item_id: OrderItemId,
    quantity: i32,
    amount: Price,
) -> Result<RefundItem, RepositoryError> {
    let item = sqlx::query_as::<_, RefundItem>(
        r"
        INSERT INTO synclune.refund_item (refund_id, order_item_id, quantity, amount_cents)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(refund_id)
    .bind(order_item_id)
    .bind(quantity)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    Ok(item)
}

/// Lines of a refund inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items_in(
    conn: &mut PgConnection,
    refund_id: RefundId,
) -> Result<Vec<RefundItem>, RepositoryError> {
    let items = sqlx::query_as::<_, RefundItem>(
        "SELECT * FROM synclune.refund_item WHERE refund_id = $1 ORDER BY id",
    )
    .bind(refund_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Lock a refund row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: RefundId) -> Result<Option<Refund>, RepositoryError> {
    let refund = sqlx::query_as::<_, Refund>("SELECT * FROM synclune.refund WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(refund)
}

/// Mark a refund completed with the provider's id.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the refund does not exist.
pub async fn mark_completed(
    conn: &mut PgConnection,
    id: RefundId,
    stripe_refund_id: &str,
) -> Result<Refund, RepositoryError> {
    sqlx::query_as::<_, Refund>(
        r"
        UPDATE synclune.refund
        SET status = 'completed', stripe_refund_id = $2, failure_reason = NULL, processed_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(stripe_refund_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}
