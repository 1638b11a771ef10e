//! Catalog reads with an in-process cache.
//!
//! Listing pages and product pages are cached for five minutes. The listing
//! cache is keyed by the full validated [`ProductFilters`], so two requests
//! share an entry only when every filter matches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use synclune_core::{Price, SkuId};

use crate::db::{ProductRepository, RepositoryError};
use crate::error::BusinessError;
use crate::models::product::{
    GalleryImage, ProductDetail, ProductFilters, ProductPage, ProductSku, ProductSort, SkuMedia,
};

/// Time-to-live of cached catalog reads.
pub const CACHE_TTL: Duration = Duration::from_secs(300);

pub const DEFAULT_PER_PAGE: u32 = 24;
pub const MAX_PER_PAGE: u32 = 48;
const MAX_SEARCH_LENGTH: usize = 100;
const MAX_CACHED_PAGES: u64 = 1_000;
const MAX_CACHED_PRODUCTS: u64 = 2_000;

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    #[serde(default)]
    pub in_stock: bool,
    pub q: Option<String>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    /// Validate and normalize into cacheable filters.
    ///
    /// Blank strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::Validation` for out-of-range pagination or prices.
    pub fn into_filters(self) -> Result<ProductFilters, BusinessError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(BusinessError::Validation(
                "Le numéro de page doit être supérieur à 0.".to_string(),
            ));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(BusinessError::Validation(format!(
                "Le nombre de produits par page doit être compris entre 1 et {MAX_PER_PAGE}."
            )));
        }

        let min_price = self.min_price.map(Price::from_cents);
        let max_price = self.max_price.map(Price::from_cents);
        if min_price.is_some_and(Price::is_negative) || max_price.is_some_and(Price::is_negative) {
            return Err(BusinessError::Validation(
                "Les prix doivent être positifs.".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            return Err(BusinessError::Validation(
                "Le prix minimum dépasse le prix maximum.".to_string(),
            ));
        }

        let search = non_blank(self.q);
        if search
            .as_ref()
            .is_some_and(|q| q.chars().count() > MAX_SEARCH_LENGTH)
        {
            return Err(BusinessError::Validation(format!(
                "La recherche ne peut pas dépasser {MAX_SEARCH_LENGTH} caractères."
            )));
        }

        Ok(ProductFilters {
            product_type: non_blank(self.product_type),
            color: non_blank(self.color),
            material: non_blank(self.material),
            min_price,
            max_price,
            in_stock: self.in_stock,
            search,
            sort: self.sort.unwrap_or_default(),
            page,
            per_page,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Product page cache key: slug and selected SKU.
type DetailKey = (String, Option<SkuId>);

/// Cached catalog reads.
#[derive(Clone)]
pub struct CatalogService {
    pages: Cache<ProductFilters, Arc<ProductPage>>,
    details: Cache<DetailKey, Arc<ProductDetail>>,
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

impl CatalogService {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            pages: Cache::builder()
                .max_capacity(MAX_CACHED_PAGES)
                .time_to_live(ttl)
                .build(),
            details: Cache::builder()
                .max_capacity(MAX_CACHED_PRODUCTS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// One page of the public listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self, pool))]
    pub async fn list(
        &self,
        pool: &PgPool,
        filters: ProductFilters,
    ) -> Result<Arc<ProductPage>, RepositoryError> {
        if let Some(page) = self.pages.get(&filters).await {
            tracing::debug!("Catalog cache hit");
            return Ok(page);
        }

        let items = ProductRepository::new(pool).list_public(&filters).await?;
        let page = Arc::new(ProductPage {
            total: items.first().map_or(0, |i| i.total_count),
            items,
            page: filters.page,
            per_page: filters.per_page,
        });

        self.pages.insert(filters, Arc::clone(&page)).await;
        Ok(page)
    }

    /// A public product with its active SKUs and the gallery of `selected`.
    ///
    /// Returns `None` for unknown, unpublished or SKU-less products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self, pool))]
    pub async fn detail(
        &self,
        pool: &PgPool,
        slug: &str,
        selected: Option<SkuId>,
    ) -> Result<Option<Arc<ProductDetail>>, RepositoryError> {
        let key = (slug.to_string(), selected);
        if let Some(detail) = self.details.get(&key).await {
            return Ok(Some(detail));
        }

        let repo = ProductRepository::new(pool);
        let Some(product) = repo.get_public_by_slug(slug).await? else {
            return Ok(None);
        };
        let skus = repo.active_skus(product.id).await?;
        if skus.is_empty() {
            return Ok(None);
        }

        let sku_ids: Vec<SkuId> = skus.iter().map(|s| s.id).collect();
        let media = repo.media_for_skus(&sku_ids).await?;
        let selected_sku_id = select_sku(&skus, selected);
        let gallery = build_gallery(&skus, &media, selected_sku_id);

        let detail = Arc::new(ProductDetail {
            product,
            skus,
            selected_sku_id,
            gallery,
        });
        self.details.insert(key, Arc::clone(&detail)).await;
        Ok(Some(detail))
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.pages.invalidate_all();
        self.details.invalidate_all();
    }
}

/// The SKU to display: the requested one if it is active, else the default
/// SKU, else the first active one.
#[must_use]
pub fn select_sku(skus: &[ProductSku], requested: Option<SkuId>) -> Option<SkuId> {
    requested
        .filter(|id| skus.iter().any(|s| s.id == *id))
        .or_else(|| skus.iter().find(|s| s.is_default).map(|s| s.id))
        .or_else(|| skus.first().map(|s| s.id))
}

/// Ordered, de-duplicated gallery.
///
/// Media of the selected SKU come first (primary, then by position), then the
/// default SKU's, then the other SKUs' in list order. A URL appears once, at
/// its first position.
#[must_use]
pub fn build_gallery(
    skus: &[ProductSku],
    media: &[SkuMedia],
    selected: Option<SkuId>,
) -> Vec<GalleryImage> {
    let default_sku = skus.iter().find(|s| s.is_default).map(|s| s.id);

    let mut order: Vec<SkuId> = Vec::with_capacity(skus.len());
    for id in selected
        .into_iter()
        .chain(default_sku)
        .chain(skus.iter().map(|s| s.id))
    {
        if !order.contains(&id) {
            order.push(id);
        }
    }

    let mut seen = HashSet::new();
    let mut gallery = Vec::new();
    for sku_id in order {
        let mut own: Vec<&SkuMedia> = media.iter().filter(|m| m.sku_id == sku_id).collect();
        own.sort_by_key(|m| (!m.is_primary, m.position, m.id));
        for m in own {
            if seen.insert(m.url.as_str()) {
                gallery.push(GalleryImage {
                    url: m.url.clone(),
                    alt: m.alt.clone(),
                    sku_id,
                });
            }
        }
    }
    gallery
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use synclune_core::{ProductId, SkuMediaId};

    use super::*;

    fn sku(id: i32, is_default: bool) -> ProductSku {
        ProductSku {
            id: SkuId::new(id),
            product_id: ProductId::new(1),
            sku: format!("SKU-{id}"),
            color: None,
            material: None,
            size: None,
            price: Price::from_cents(4_900),
            compare_at_price: None,
            inventory: 3,
            is_active: true,
            is_default,
        }
    }

    fn media(id: i32, sku_id: i32, url: &str, is_primary: bool, position: i32) -> SkuMedia {
        SkuMedia {
            id: SkuMediaId::new(id),
            sku_id: SkuId::new(sku_id),
            url: url.to_string(),
            alt: None,
            is_primary,
            position,
        }
    }

    fn urls(gallery: &[GalleryImage]) -> Vec<&str> {
        gallery.iter().map(|g| g.url.as_str()).collect()
    }

    #[test]
    fn test_gallery_selected_sku_first_then_default() {
        let skus = vec![sku(1, true), sku(2, false), sku(3, false)];
        let media = vec![
            media(1, 1, "default-a.jpg", true, 0),
            media(2, 2, "selected-b.jpg", false, 1),
            media(3, 2, "selected-a.jpg", true, 5),
            media(4, 3, "other.jpg", true, 0),
        ];

        let gallery = build_gallery(&skus, &media, Some(SkuId::new(2)));
        assert_eq!(
            urls(&gallery),
            vec!["selected-a.jpg", "selected-b.jpg", "default-a.jpg", "other.jpg"]
        );
    }

    #[test]
    fn test_gallery_deduplicates_urls() {
        let skus = vec![sku(1, true), sku(2, false)];
        let media = vec![
            media(1, 1, "shared.jpg", true, 0),
            media(2, 2, "shared.jpg", true, 0),
            media(3, 2, "own.jpg", false, 1),
        ];

        let gallery = build_gallery(&skus, &media, Some(SkuId::new(2)));
        assert_eq!(urls(&gallery), vec!["shared.jpg", "own.jpg"]);
        assert_eq!(gallery[0].sku_id, SkuId::new(2));
    }

    #[test]
    fn test_select_sku_falls_back_to_default_then_first() {
        let skus = vec![sku(4, false), sku(5, true)];
        assert_eq!(select_sku(&skus, Some(SkuId::new(4))), Some(SkuId::new(4)));
        assert_eq!(select_sku(&skus, Some(SkuId::new(99))), Some(SkuId::new(5)));
        assert_eq!(select_sku(&skus, None), Some(SkuId::new(5)));

        let no_default = vec![sku(7, false), sku(8, false)];
        assert_eq!(select_sku(&no_default, None), Some(SkuId::new(7)));
        assert_eq!(select_sku(&[], None), None);
    }

    #[test]
    fn test_list_query_defaults() {
        let filters = ListQuery::default().into_filters().unwrap();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.per_page, DEFAULT_PER_PAGE);
        assert_eq!(filters.sort, ProductSort::Newest);
        assert_eq!(filters.offset(), 0);
    }

    #[test]
    fn test_list_query_rejects_bad_pagination() {
        let zero_page = ListQuery {
            page: Some(0),
            ..ListQuery::default()
        };
        assert!(zero_page.into_filters().is_err());

        let too_many = ListQuery {
            per_page: Some(MAX_PER_PAGE + 1),
            ..ListQuery::default()
        };
        assert!(too_many.into_filters().is_err());
    }

    #[test]
    fn test_list_query_normalizes_blank_and_checks_prices() {
        let query = ListQuery {
            color: Some("  ".to_string()),
            q: Some(" lune ".to_string()),
            min_price: Some(1_000),
            max_price: Some(5_000),
            page: Some(3),
            per_page: Some(10),
            ..ListQuery::default()
        };
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.color, None);
        assert_eq!(filters.search.as_deref(), Some("lune"));
        assert_eq!(filters.offset(), 20);

        let inverted = ListQuery {
            min_price: Some(5_000),
            max_price: Some(1_000),
            ..ListQuery::default()
        };
        assert!(inverted.into_filters().is_err());
    }
}
