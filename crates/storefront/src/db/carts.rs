//! Cart repository.
//!
//! A cart belongs either to a user (`user_id`, no expiry) or to an anonymous
//! session (`session_id`, `expires_at` pushed forward on every write).

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use synclune_core::{CartId, Price, SkuId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartLineRow};

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            r"
            SELECT id, user_id, session_id, expires_at, created_at, updated_at
            FROM synclune.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(cart)
    }

    /// The anonymous cart of a session, ignoring expired ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_session(&self, session_id: &str) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            r"
            SELECT id, user_id, session_id, expires_at, created_at, updated_at
            FROM synclune.cart
            WHERE session_id = $1 AND user_id IS NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            ",
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(cart)
    }

    /// Fetch or create the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_user(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            r"
            INSERT INTO synclune.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id, user_id, session_id, expires_at, created_at, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(cart)
    }

    /// Fetch or create the anonymous cart of a session and push its expiry.
    ///
    /// An expired cart still present under the same session id is emptied
    /// and revived.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            DELETE FROM synclune.cart
            WHERE session_id = $1 AND user_id IS NULL AND expires_at <= NOW()
            ",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        let cart = sqlx::query_as::<_, Cart>(
            r"
            INSERT INTO synclune.cart (session_id, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (session_id) DO UPDATE
                SET expires_at = EXCLUDED.expires_at, updated_at = NOW()
            RETURNING id, user_id, session_id, expires_at, created_at, updated_at
            ",
        )
        .bind(session_id)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(cart)
    }

    /// Cart lines joined with live SKU and product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLineRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.sku_id, ci.quantity, ci.price_at_add_cents,
                   s.price_cents, s.inventory, s.is_active AS sku_active,
                   p.status AS product_status, p.title AS product_title, p.slug AS product_slug,
                   s.sku AS sku_code, s.color, s.material, s.size,
                   (SELECT m.url FROM synclune.sku_media m
                    WHERE m.sku_id = s.id
                    ORDER BY m.is_primary DESC, m.position LIMIT 1) AS image_url
            FROM synclune.cart_item ci
            JOIN synclune.product_sku s ON s.id = ci.sku_id
            JOIN synclune.product p ON p.id = s.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Quantity of a SKU already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn item_quantity(
        &self,
        cart_id: CartId,
        sku_id: SkuId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM synclune.cart_item WHERE cart_id = $1 AND sku_id = $2",
        )
        .bind(cart_id)
        .bind(sku_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity)
    }

    /// Insert a line or overwrite its quantity. `price_at_add` is only
    /// written on insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_item(
        &self,
        cart_id: CartId,
        sku_id: SkuId,
        quantity: i32,
        price_at_add: Price,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_item(&mut conn, cart_id, sku_id, quantity, price_at_add).await
    }

    /// Overwrite a line's quantity. Returns `false` if the line does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        sku_id: SkuId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE synclune.cart_item
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND sku_id = $2
            ",
        )
        .bind(cart_id)
        .bind(sku_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a line. Returns `false` if the line does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(&self, cart_id: CartId, sku_id: SkuId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM synclune.cart_item WHERE cart_id = $1 AND sku_id = $2")
            .bind(cart_id)
            .bind(sku_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Total units in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, cart_id: CartId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM synclune.cart_item WHERE cart_id = $1",
        )
        .bind(cart_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Delete up to `limit` anonymous carts past their expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_expired(&self, limit: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM synclune.cart
            WHERE id IN (
                SELECT id FROM synclune.cart
                WHERE user_id IS NULL AND expires_at < NOW()
                ORDER BY expires_at
                LIMIT $1
            )
            ",
        )
        .bind(limit)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Insert a line or overwrite its quantity.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_item(
    conn: &mut PgConnection,
    cart_id: CartId,
    sku_id: SkuId,
    quantity: i32,
    price_at_add: Price,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO synclune.cart_item (cart_id, sku_id, quantity, price_at_add_cents)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, sku_id) DO UPDATE
            SET quantity = EXCLUDED.quantity, updated_at = NOW()
        ",
    )
    .bind(cart_id)
    .bind(sku_id)
    .bind(quantity)
    .bind(price_at_add)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE synclune.cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Lock a cart row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
    let cart = sqlx::query_as::<_, Cart>(
        r"
        SELECT id, user_id, session_id, expires_at, created_at, updated_at
        FROM synclune.cart
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(cart_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(cart)
}

/// Lines of a cart inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines_in(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartLineRow>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT ci.sku_id, ci.quantity, ci.price_at_add_cents,
               s.price_cents, s.inventory, s.is_active AS sku_active,
               p.status AS product_status, p.title AS product_title, p.slug AS product_slug,
               s.sku AS sku_code, s.color, s.material, s.size,
               NULL::TEXT AS image_url
        FROM synclune.cart_item ci
        JOIN synclune.product_sku s ON s.id = ci.sku_id
        JOIN synclune.product p ON p.id = s.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        ",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Delete a cart and its items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM synclune.cart WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete every cart of a user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_for_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM synclune.cart WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Empty the cart of whoever placed an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_for_buyer(
    conn: &mut PgConnection,
    user_id: Option<UserId>,
    session_id: Option<&str>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM synclune.cart_item
        WHERE cart_id IN (
            SELECT id FROM synclune.cart
            WHERE ($1::INTEGER IS NOT NULL AND user_id = $1)
               OR ($2::TEXT IS NOT NULL AND session_id = $2 AND user_id IS NULL)
        )
        ",
    )
    .bind(user_id)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
