//! Catalog queries: listing, product pages and live SKU state.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use synclune_core::{ProductId, SkuId};

use super::{RepositoryError, contains_pattern};
use crate::models::product::{
    Product, ProductFilters, ProductSku, ProductSort, ProductSummary, SkuMedia, SkuSnapshot,
};

/// Repository for catalog reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Public products with at least one active SKU, filtered and paginated.
    ///
    /// Each row carries the total match count (`COUNT(*) OVER ()`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_public(
        &self,
        filters: &ProductFilters,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            r"
            WITH sku_stats AS (
                SELECT product_id,
                       MIN(price_cents) AS from_price_cents,
                       BOOL_OR(inventory > 0) AS in_stock
                FROM synclune.product_sku
                WHERE is_active
                GROUP BY product_id
            )
            SELECT p.id, p.slug, p.title, p.product_type, p.created_at,
                   st.from_price_cents, st.in_stock,
                   (SELECT m.url
                    FROM synclune.sku_media m
                    JOIN synclune.product_sku ds ON ds.id = m.sku_id
                    WHERE ds.product_id = p.id AND ds.is_active
                    ORDER BY ds.is_default DESC, ds.id, m.is_primary DESC, m.position
                    LIMIT 1) AS image_url,
                   COUNT(*) OVER () AS total_count
            FROM synclune.product p
            JOIN sku_stats st ON st.product_id = p.id
            WHERE p.status = 'public'
            ",
        );

        if let Some(product_type) = &filters.product_type {
            qb.push(" AND p.product_type = ").push_bind(product_type.clone());
        }

        // Variant filters must be satisfied by a single SKU
        if filters.color.is_some()
            || filters.material.is_some()
            || filters.min_price.is_some()
            || filters.max_price.is_some()
        {
            qb.push(
                " AND EXISTS (SELECT 1 FROM synclune.product_sku s \
                 WHERE s.product_id = p.id AND s.is_active",
            );
            if let Some(color) = &filters.color {
                qb.push(" AND LOWER(s.color) = LOWER(")
                    .push_bind(color.clone())
                    .push(")");
            }
            if let Some(material) = &filters.material {
                qb.push(" AND LOWER(s.material) = LOWER(")
                    .push_bind(material.clone())
                    .push(")");
            }
            if let Some(min) = filters.min_price {
                qb.push(" AND s.price_cents >= ").push_bind(min);
            }
            if let Some(max) = filters.max_price {
                qb.push(" AND s.price_cents <= ").push_bind(max);
            }
            qb.push(")");
        }

        if filters.in_stock {
            qb.push(" AND st.in_stock");
        }

        if let Some(search) = &filters.search {
            let pattern = contains_pattern(search);
            qb.push(" AND (p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(match filters.sort {
            ProductSort::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            ProductSort::PriceAsc => " ORDER BY st.from_price_cents ASC, p.id",
            ProductSort::PriceDesc => " ORDER BY st.from_price_cents DESC, p.id",
            ProductSort::Title => " ORDER BY p.title ASC, p.id",
        });

        qb.push(" LIMIT ")
            .push_bind(i64::from(filters.per_page))
            .push(" OFFSET ")
            .push_bind(filters.offset());

        let rows = qb
            .build_query_as::<ProductSummary>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// A public product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_public_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            SELECT id, slug, title, description, product_type, status, created_at, updated_at
            FROM synclune.product
            WHERE slug = $1 AND status = 'public'
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Active SKUs of a product, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_skus(&self, product_id: ProductId) -> Result<Vec<ProductSku>, RepositoryError> {
        let skus = sqlx::query_as::<_, ProductSku>(
            r"
            SELECT id, product_id, sku, color, material, size, price_cents,
                   compare_at_price_cents, inventory, is_active, is_default
            FROM synclune.product_sku
            WHERE product_id = $1 AND is_active
            ORDER BY is_default DESC, id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(skus)
    }

    /// Media of the given SKUs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn media_for_skus(&self, sku_ids: &[SkuId]) -> Result<Vec<SkuMedia>, RepositoryError> {
        let ids: Vec<i32> = sku_ids.iter().map(SkuId::as_i32).collect();
        let media = sqlx::query_as::<_, SkuMedia>(
            r"
            SELECT id, sku_id, url, alt, is_primary, position
            FROM synclune.sku_media
            WHERE sku_id = ANY($1)
            ORDER BY sku_id, is_primary DESC, position, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(media)
    }

    /// Live state of the given SKUs (batch read, no locks).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn snapshots(&self, sku_ids: &[SkuId]) -> Result<Vec<SkuSnapshot>, RepositoryError> {
        let ids: Vec<i32> = sku_ids.iter().map(SkuId::as_i32).collect();
        let rows = sqlx::query_as::<_, SkuSnapshot>(
            r"
            SELECT s.id AS sku_id, s.product_id, p.title AS product_title, p.slug AS product_slug,
                   p.status AS product_status, s.sku AS sku_code, s.color, s.material, s.size,
                   s.price_cents, s.inventory, s.is_active,
                   (SELECT m.url FROM synclune.sku_media m
                    WHERE m.sku_id = s.id
                    ORDER BY m.is_primary DESC, m.position LIMIT 1) AS image_url
            FROM synclune.product_sku s
            JOIN synclune.product p ON p.id = s.product_id
            WHERE s.id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Live state of one SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn snapshot(&self, sku_id: SkuId) -> Result<Option<SkuSnapshot>, RepositoryError> {
        Ok(self.snapshots(&[sku_id]).await?.into_iter().next())
    }
}

/// Lock the given SKU rows for the rest of the transaction.
///
/// Rows are locked in id order so concurrent checkouts cannot deadlock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_snapshots(
    conn: &mut PgConnection,
    sku_ids: &[SkuId],
) -> Result<Vec<SkuSnapshot>, RepositoryError> {
    let ids: Vec<i32> = sku_ids.iter().map(SkuId::as_i32).collect();
    let rows = sqlx::query_as::<_, SkuSnapshot>(
        r"
        SELECT s.id AS sku_id, s.product_id, p.title AS product_title, p.slug AS product_slug,
               p.status AS product_status, s.sku AS sku_code, s.color, s.material, s.size,
               s.price_cents, s.inventory, s.is_active,
               (SELECT m.url FROM synclune.sku_media m
                WHERE m.sku_id = s.id
                ORDER BY m.is_primary DESC, m.position LIMIT 1) AS image_url
        FROM synclune.product_sku s
        JOIN synclune.product p ON p.id = s.product_id
        WHERE s.id = ANY($1)
        ORDER BY s.id
        FOR UPDATE OF s
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Take `quantity` units out of stock.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the stock is insufficient.
pub async fn decrement_inventory(
    conn: &mut PgConnection,
    sku_id: SkuId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE synclune.product_sku
        SET inventory = inventory - $2, updated_at = NOW()
        WHERE id = $1 AND inventory >= $2
        ",
    )
    .bind(sku_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "insufficient inventory for sku {sku_id}"
        )));
    }
    Ok(())
}

/// Put `quantity` units back in stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_inventory(
    conn: &mut PgConnection,
    sku_id: SkuId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE synclune.product_sku
        SET inventory = inventory + $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(sku_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
