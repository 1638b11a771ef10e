//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{Price, ProductId, ProductStatus, SkuId, SkuMediaId};

/// A product page: title, description and a set of SKUs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub product_type: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable variant with its own price and inventory.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSku {
    pub id: SkuId,
    pub product_id: ProductId,
    pub sku: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    #[sqlx(rename = "price_cents")]
    pub price: Price,
    #[sqlx(rename = "compare_at_price_cents")]
    pub compare_at_price: Option<Price>,
    pub inventory: i32,
    pub is_active: bool,
    pub is_default: bool,
}

impl ProductSku {
    /// Active with at least one unit left.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active && self.inventory > 0
    }
}

/// An image attached to a SKU.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SkuMedia {
    pub id: SkuMediaId,
    pub sku_id: SkuId,
    pub url: String,
    pub alt: Option<String>,
    pub is_primary: bool,
    pub position: i32,
}

/// One row of the product listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: ProductId,
    pub slug: String,
    pub title: String,
    pub product_type: String,
    /// Lowest price among active SKUs.
    #[sqlx(rename = "from_price_cents")]
    pub from_price: Price,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    /// Total rows matching the filters, repeated on every row.
    #[serde(skip)]
    pub total_count: i64,
}

/// A page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Gallery entry shown on the product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    pub url: String,
    pub alt: Option<String>,
    pub sku_id: SkuId,
}

/// Product page payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub skus: Vec<ProductSku>,
    pub selected_sku_id: Option<SkuId>,
    pub gallery: Vec<GalleryImage>,
}

/// Live state of a SKU joined with its product, as read at cart and
/// checkout time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SkuSnapshot {
    pub sku_id: SkuId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub product_status: ProductStatus,
    pub sku_code: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    #[sqlx(rename = "price_cents")]
    pub price: Price,
    pub inventory: i32,
    pub is_active: bool,
    pub image_url: Option<String>,
}

impl SkuSnapshot {
    /// Active SKU of a public product.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.product_status == ProductStatus::Public
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
}

/// Validated listing filters. Also the catalog cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilters {
    pub product_type: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub in_stock: bool,
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: u32,
    pub per_page: u32,
}

impl ProductFilters {
    /// Rows to skip for the current page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}
