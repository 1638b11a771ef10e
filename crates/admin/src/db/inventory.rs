//! SKU stock and availability written from the back-office.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use synclune_core::{Price, ProductId, SkuId};
use synclune_storefront::db::RepositoryError;

/// A SKU as shown on the inventory screen.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryRow {
    pub id: SkuId,
    pub product_id: ProductId,
    pub product_title: String,
    pub sku: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    #[sqlx(rename = "price_cents")]
    pub price: Price,
    pub inventory: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

const INVENTORY_COLUMNS: &str = r"
    s.id, s.product_id, p.title AS product_title, s.sku, s.color, s.material, s.size,
    s.price_cents, s.inventory, s.is_active, s.updated_at
";

/// Repository for inventory reads and writes.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All SKUs, optionally only those with at most `max_inventory` units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, max_inventory: Option<i32>) -> Result<Vec<InventoryRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            r"
            SELECT {INVENTORY_COLUMNS}
            FROM synclune.product_sku s
            JOIN synclune.product p ON p.id = s.product_id
            WHERE ($1::INTEGER IS NULL OR s.inventory <= $1)
            ORDER BY s.inventory ASC, p.title, s.id
            "
        ))
        .bind(max_inventory)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Overwrite the stock of a SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU does not exist.
    pub async fn set_inventory(
        &self,
        id: SkuId,
        inventory: i32,
    ) -> Result<InventoryRow, RepositoryError> {
        sqlx::query_as::<_, InventoryRow>(&format!(
            r"
            WITH s AS (
                UPDATE synclune.product_sku
                SET inventory = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {INVENTORY_COLUMNS}
            FROM s
            JOIN synclune.product p ON p.id = s.product_id
            "
        ))
        .bind(id)
        .bind(inventory)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Flip `is_active`. Inactive SKUs disappear from the catalog and
    /// cannot be bought.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU does not exist.
    pub async fn toggle_active(&self, id: SkuId) -> Result<InventoryRow, RepositoryError> {
        sqlx::query_as::<_, InventoryRow>(&format!(
            r"
            WITH s AS (
                UPDATE synclune.product_sku
                SET is_active = NOT is_active, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {INVENTORY_COLUMNS}
            FROM s
            JOIN synclune.product p ON p.id = s.product_id
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
