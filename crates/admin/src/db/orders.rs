//! Back-office order queries: filtered listing and fulfillment updates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use synclune_core::{OrderId, OrderStatus, PaymentStatus, Price};
use synclune_storefront::db::{RepositoryError, contains_pattern};
use synclune_storefront::models::order::Order;

/// Listing filters, already validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matched against order number, email and customer name.
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl OrderFilters {
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// One row of the order listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub customer_email: String,
    pub customer_name: String,
    #[sqlx(rename = "total_cents")]
    pub total: Price,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub total_count: i64,
}

/// Tracking details recorded when an order ships.
#[derive(Debug, Clone)]
pub struct Shipment<'a> {
    pub carrier: &'a str,
    pub tracking_number: &'a str,
    pub tracking_url: Option<&'a str>,
}

/// Repository for back-office order reads.
pub struct AdminOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminOrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders matching `filters`, newest first.
    ///
    /// Each row carries the total match count (`COUNT(*) OVER ()`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filters: &OrderFilters) -> Result<Vec<OrderSummary>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            r"
            SELECT o.id, o.order_number, o.customer_email, o.customer_name, o.total_cents,
                   o.status, o.payment_status, o.created_at,
                   (SELECT COALESCE(SUM(i.quantity), 0)::BIGINT
                    FROM synclune.order_item i
                    WHERE i.order_id = o.id) AS item_count,
                   COUNT(*) OVER () AS total_count
            FROM synclune.order o
            WHERE TRUE
            ",
        );

        if let Some(status) = filters.status {
            qb.push(" AND o.status = ").push_bind(status);
        }
        if let Some(payment_status) = filters.payment_status {
            qb.push(" AND o.payment_status = ").push_bind(payment_status);
        }
        if let Some(search) = &filters.search {
            let pattern = contains_pattern(search);
            qb.push(" AND (o.order_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR o.customer_email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR o.customer_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(i64::from(filters.per_page))
            .push(" OFFSET ")
            .push_bind(filters.offset());

        let rows = qb
            .build_query_as::<OrderSummary>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }
}

/// Record the shipment of a processing order. Returns `None` if the order
/// was not in the processing state.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_shipped(
    conn: &mut PgConnection,
    id: OrderId,
    shipment: &Shipment<'_>,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        UPDATE synclune.order
        SET status = 'shipped',
            fulfillment_status = 'shipped',
            carrier = $2,
            tracking_number = $3,
            tracking_url = $4,
            shipped_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(shipment.carrier)
    .bind(shipment.tracking_number)
    .bind(shipment.tracking_url)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Mark a shipped order delivered. Returns `None` if it was not shipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_delivered(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        UPDATE synclune.order
        SET status = 'delivered',
            fulfillment_status = 'delivered',
            delivered_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = 'shipped'
        RETURNING *
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Set the payment status after a refund settles.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(
        r"
        UPDATE synclune.order
        SET payment_status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payment_status)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        let filters = OrderFilters {
            page: 3,
            per_page: 25,
            ..OrderFilters::default()
        };
        assert_eq!(filters.offset(), 50);

        let first = OrderFilters {
            page: 0,
            per_page: 25,
            ..OrderFilters::default()
        };
        assert_eq!(first.offset(), 0);
    }
}
