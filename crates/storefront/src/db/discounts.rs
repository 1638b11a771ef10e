//! Discount (promo code) repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use synclune_core::{DiscountId, DiscountKind, Email, OrderId, Price, UserId};

use super::RepositoryError;
use crate::models::discount::{Discount, DiscountUsage};

/// Fields of a discount written by the back-office.
#[derive(Debug, Clone)]
pub struct DiscountInput {
    pub code: String,
    pub kind: DiscountKind,
    pub min_order_amount: Option<Price>,
    pub max_usage_count: Option<i32>,
    pub max_usage_per_user: Option<i32>,
    pub is_active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Repository for discount database operations.
pub struct DiscountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DiscountRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A discount by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, RepositoryError> {
        let discount = sqlx::query_as::<_, Discount>(
            r"
            SELECT id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                   max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                   created_at, updated_at
            FROM synclune.discount
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(discount)
    }

    /// A discount by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DiscountId) -> Result<Option<Discount>, RepositoryError> {
        let discount = sqlx::query_as::<_, Discount>(
            r"
            SELECT id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                   max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                   created_at, updated_at
            FROM synclune.discount
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(discount)
    }

    /// Times a customer already used a discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_usage_count(
        &self,
        discount_id: DiscountId,
        user_id: Option<UserId>,
        email: &Email,
    ) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        customer_usage_count(&mut conn, discount_id, user_id, email).await
    }

    /// All discounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Discount>, RepositoryError> {
        let discounts = sqlx::query_as::<_, Discount>(
            r"
            SELECT id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                   max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                   created_at, updated_at
            FROM synclune.discount
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(discounts)
    }

    /// Create a discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &DiscountInput) -> Result<Discount, RepositoryError> {
        let (discount_type, value) = input.kind.into_parts();
        sqlx::query_as::<_, Discount>(
            r"
            INSERT INTO synclune.discount (
                code, discount_type, value, min_order_amount_cents, max_usage_count,
                max_usage_per_user, is_active, starts_at, ends_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                      max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                      created_at, updated_at
            ",
        )
        .bind(&input.code)
        .bind(discount_type)
        .bind(value)
        .bind(input.min_order_amount)
        .bind(input.max_usage_count)
        .bind(input.max_usage_per_user)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "discount code"))
    }

    /// Overwrite a discount's rules. Recorded usages are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: DiscountId,
        input: &DiscountInput,
    ) -> Result<Discount, RepositoryError> {
        let (discount_type, value) = input.kind.into_parts();
        sqlx::query_as::<_, Discount>(
            r"
            UPDATE synclune.discount
            SET code = $2, discount_type = $3, value = $4, min_order_amount_cents = $5,
                max_usage_count = $6, max_usage_per_user = $7, is_active = $8,
                starts_at = $9, ends_at = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                      max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.code)
        .bind(discount_type)
        .bind(value)
        .bind(input.min_order_amount)
        .bind(input.max_usage_count)
        .bind(input.max_usage_per_user)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "discount code"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Flip `is_active`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the discount does not exist.
    pub async fn toggle_active(&self, id: DiscountId) -> Result<Discount, RepositoryError> {
        sqlx::query_as::<_, Discount>(
            r"
            UPDATE synclune.discount
            SET is_active = NOT is_active, updated_at = NOW()
            WHERE id = $1
            RETURNING id, code, discount_type, value, min_order_amount_cents, max_usage_count,
                      max_usage_per_user, usage_count, is_active, starts_at, ends_at,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a discount that was never used.
    ///
    /// Returns `false` when usages exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the discount does not exist.
    pub async fn delete_unused(&self, id: DiscountId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let usage_count = sqlx::query_scalar::<_, i32>(
            "SELECT usage_count FROM synclune.discount WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let recorded = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM synclune.discount_usage WHERE discount_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if usage_count > 0 || recorded > 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM synclune.discount WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// The usage recorded for an order, if a code was applied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn usage_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<DiscountUsage>, RepositoryError> {
        let usage = sqlx::query_as::<_, DiscountUsage>(
            r"
            SELECT id, discount_id, order_id, user_id, customer_email, discount_code,
                   amount_applied_cents, created_at
            FROM synclune.discount_usage
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(usage)
    }
}

/// Lock a discount row by code for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Discount>, RepositoryError> {
    let discount = sqlx::query_as::<_, Discount>(
        r"
        SELECT id, code, discount_type, value, min_order_amount_cents, max_usage_count,
               max_usage_per_user, usage_count, is_active, starts_at, ends_at,
               created_at, updated_at
        FROM synclune.discount
        WHERE code = $1
        FOR UPDATE
        ",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(discount)
}

/// Usages of a discount by one customer, matched by account or email.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn customer_usage_count(
    conn: &mut PgConnection,
    discount_id: DiscountId,
    user_id: Option<UserId>,
    email: &Email,
) -> Result<i64, RepositoryError> {
    let count = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COUNT(*)
        FROM synclune.discount_usage
        WHERE discount_id = $1
          AND (($2::INTEGER IS NOT NULL AND user_id = $2) OR customer_email = $3)
        ",
    )
    .bind(discount_id)
    .bind(user_id)
    .bind(email)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Record a usage snapshot and bump the global counter.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn record_usage(
    conn: &mut PgConnection,
    discount: &Discount,
    order_id: OrderId,
    user_id: Option<UserId>,
    email: &Email,
    amount_applied: Price,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO synclune.discount_usage (
            discount_id, order_id, user_id, customer_email, discount_code, amount_applied_cents
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(discount.id)
    .bind(order_id)
    .bind(user_id)
    .bind(email)
    .bind(&discount.code)
    .bind(amount_applied)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE synclune.discount SET usage_count = usage_count + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(discount.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Drop the usage of an order and give the slot back to the counter.
///
/// Returns the discount that was released, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn release_usage(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<DiscountId>, RepositoryError> {
    let released = sqlx::query_scalar::<_, DiscountId>(
        "DELETE FROM synclune.discount_usage WHERE order_id = $1 RETURNING discount_id",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(discount_id) = released {
        sqlx::query(
            r"
            UPDATE synclune.discount
            SET usage_count = GREATEST(usage_count - 1, 0), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(discount_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(released)
}
