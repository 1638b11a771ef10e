//! Order repository.
//!
//! Writes that must stay consistent with inventory and discount counters are
//! free functions over `&mut PgConnection` so callers can compose them inside
//! one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use synclune_core::{Email, OrderId, PaymentStatus, Price, SkuId, UserId};

use super::{RepositoryError, discounts, products};
use crate::models::order::{Order, OrderItem, OrderWithItems, ShippingAddress};
use crate::models::product::SkuSnapshot;

/// Values of a new pending order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: Option<UserId>,
    pub guest_session_id: Option<&'a str>,
    pub customer_email: &'a Email,
    pub shipping_address: &'a ShippingAddress,
    pub subtotal: Price,
    pub discount_amount: Price,
    pub shipping: Price,
    pub tax_amount: Price,
    pub total: Price,
}

/// What releasing an order's reservations gave back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReleasedReservations {
    pub units_restocked: i64,
    pub discount_released: bool,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM synclune.order WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Get an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM synclune.order_item WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Order history of a user, newest first, with lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM synclune.order WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM synclune.order_item WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }

    /// Find the order created for a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM synclune.order WHERE stripe_checkout_session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Store the provider ids obtained after the order was committed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order no longer exists.
    pub async fn set_payment_session(
        &self,
        id: OrderId,
        checkout_session_id: &str,
        coupon_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE synclune.order
            SET stripe_checkout_session_id = $2, stripe_coupon_id = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(checkout_session_id)
        .bind(coupon_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record the refund state reported by the provider for a payment.
    ///
    /// Returns `None` when no paid order matches the payment intent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_refund_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            r"
            UPDATE synclune.order
            SET payment_status = $2, updated_at = NOW()
            WHERE stripe_payment_intent_id = $1
              AND payment_status IN ('paid', 'partially_refunded', 'refunded')
            RETURNING *
            ",
        )
        .bind(payment_intent_id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }
}

/// Whether an order number is already taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn order_number_exists(
    conn: &mut PgConnection,
    order_number: &str,
) -> Result<bool, RepositoryError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM synclune.order WHERE order_number = $1)",
    )
    .bind(order_number)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Insert a pending order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number is taken.
pub async fn insert(conn: &mut PgConnection, new: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    let address = new.shipping_address;
    sqlx::query_as::<_, Order>(
        r"
        INSERT INTO synclune.order (
            order_number, user_id, guest_session_id, customer_email, customer_name,
            customer_phone, shipping_first_name, shipping_last_name, shipping_address1,
            shipping_address2, shipping_postal_code, shipping_city, shipping_country,
            subtotal_cents, discount_amount_cents, shipping_cents, tax_cents, total_cents
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING *
        ",
    )
    .bind(new.order_number)
    .bind(new.user_id)
    .bind(new.guest_session_id)
    .bind(new.customer_email)
    .bind(address.full_name())
    .bind(address.phone.as_deref())
    .bind(address.first_name.trim())
    .bind(address.last_name.trim())
    .bind(address.address1.trim())
    .bind(address.address2.as_deref().map(str::trim))
    .bind(address.postal_code.trim())
    .bind(address.city.trim())
    .bind(&address.country)
    .bind(new.subtotal)
    .bind(new.discount_amount)
    .bind(new.shipping)
    .bind(new.tax_amount)
    .bind(new.total)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "order number"))
}

/// Insert a line snapshot copied from the live SKU.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    sku: &SkuSnapshot,
    quantity: i32,
) -> Result<OrderItem, RepositoryError> {
    let item = sqlx::query_as::<_, OrderItem>(
        r"
        INSERT INTO synclune.order_item (
            order_id, sku_id, product_id, product_title, product_slug, sku_code,
            sku_color, sku_material, sku_size, image_url, unit_price_cents, quantity
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        ",
    )
    .bind(order_id)
    .bind(sku.sku_id)
    .bind(sku.product_id)
    .bind(&sku.product_title)
    .bind(&sku.product_slug)
    .bind(&sku.sku_code)
    .bind(&sku.color)
    .bind(&sku.material)
    .bind(&sku.size)
    .bind(&sku.image_url)
    .bind(sku.price)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;

    Ok(item)
}

/// Lock an order row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM synclune.order WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

/// Lines of an order inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items_in(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM synclune.order_item WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Mark a pending order paid. Returns `None` if it was not pending.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
    payment_intent_id: Option<&str>,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        UPDATE synclune.order
        SET payment_status = 'paid',
            status = 'processing',
            fulfillment_status = 'processing',
            stripe_payment_intent_id = COALESCE($2, stripe_payment_intent_id),
            paid_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND payment_status = 'pending'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payment_intent_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Cancel an order that never got paid. Returns `None` if it was not pending.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn cancel_unpaid(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        UPDATE synclune.order
        SET payment_status = $2,
            status = 'cancelled',
            cancelled_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND payment_status = 'pending'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payment_status)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Give back the stock and discount slot an unpaid order was holding.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn release_reservations(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<ReleasedReservations, RepositoryError> {
    let lines = sqlx::query_as::<_, (SkuId, i32)>(
        r"
        SELECT sku_id, quantity
        FROM synclune.order_item
        WHERE order_id = $1 AND sku_id IS NOT NULL
        ORDER BY sku_id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut released = ReleasedReservations::default();
    for (sku_id, quantity) in lines {
        products::restore_inventory(conn, sku_id, quantity).await?;
        released.units_restocked += i64::from(quantity);
    }
    released.discount_released = discounts::release_usage(conn, order_id).await?.is_some();

    Ok(released)
}

/// Delete an order. Items and usage rows cascade.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(conn: &mut PgConnection, id: OrderId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM synclune.order WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Pending-payment orders created before `cutoff`, locked and skipping rows
/// another worker holds.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_stale_pending(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Order>, RepositoryError> {
    let orders = sqlx::query_as::<_, Order>(
        r"
        SELECT * FROM synclune.order
        WHERE payment_status = 'pending' AND status = 'pending' AND created_at < $1
        ORDER BY created_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        ",
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(orders)
}

/// Scrub contact data from a user's orders, keeping accounting fields.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn scrub_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    anonymized_email: &Email,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE synclune.order
        SET customer_email = $2,
            customer_phone = NULL,
            shipping_address1 = '',
            shipping_address2 = NULL,
            updated_at = NOW()
        WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .bind(anonymized_email)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE synclune.discount_usage SET customer_email = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(anonymized_email)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
