//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{CartId, Price, ProductStatus, SkuId, UserId};

/// A cart owned either by a user or by an anonymous session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with its live SKU and product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow {
    pub sku_id: SkuId,
    pub quantity: i32,
    #[sqlx(rename = "price_at_add_cents")]
    pub price_at_add: Price,
    #[sqlx(rename = "price_cents")]
    pub current_price: Price,
    pub inventory: i32,
    pub sku_active: bool,
    pub product_status: ProductStatus,
    pub product_title: String,
    pub product_slug: String,
    pub sku_code: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub image_url: Option<String>,
}

/// One cart line as shown to the buyer.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub sku_id: SkuId,
    pub product_title: String,
    pub product_slug: String,
    pub sku: String,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Price,
    pub price_at_add: Price,
    /// The live price differs from the price when the item was added.
    pub price_changed: bool,
    /// Still purchasable in the requested quantity.
    pub available: bool,
    pub line_total: Price,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let available = row.sku_active
            && row.product_status == ProductStatus::Public
            && row.inventory >= row.quantity;
        Self {
            sku_id: row.sku_id,
            line_total: row.current_price.times(row.quantity),
            price_changed: row.current_price != row.price_at_add,
            available,
            unit_price: row.current_price,
            price_at_add: row.price_at_add,
            quantity: row.quantity,
            product_title: row.product_title,
            product_slug: row.product_slug,
            sku: row.sku_code,
            color: row.color,
            material: row.material,
            size: row.size,
            image_url: row.image_url,
        }
    }
}

/// The whole cart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    /// Sum of available lines at live prices.
    pub subtotal: Price,
}

impl CartView {
    /// Build the view from joined rows.
    #[must_use]
    pub fn from_rows(rows: Vec<CartLineRow>) -> Self {
        let lines: Vec<CartLine> = rows.into_iter().map(CartLine::from).collect();
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = lines
            .iter()
            .filter(|l| l.available)
            .map(|l| l.line_total)
            .sum();
        Self {
            lines,
            item_count,
            subtotal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sku: i32, quantity: i32, added: i64, live: i64, inventory: i32) -> CartLineRow {
        CartLineRow {
            sku_id: SkuId::new(sku),
            quantity,
            price_at_add: Price::from_cents(added),
            current_price: Price::from_cents(live),
            inventory,
            sku_active: true,
            product_status: ProductStatus::Public,
            product_title: "Boucles Lune".to_string(),
            product_slug: "boucles-lune".to_string(),
            sku_code: format!("BL-{sku}"),
            color: Some("Or".to_string()),
            material: None,
            size: None,
            image_url: None,
        }
    }

    #[test]
    fn test_cart_view_flags_price_changes() {
        let view = CartView::from_rows(vec![row(1, 2, 3_500, 3_900, 5)]);
        let line = &view.lines[0];
        assert!(line.price_changed);
        assert_eq!(line.unit_price, Price::from_cents(3_900));
        assert_eq!(line.line_total, Price::from_cents(7_800));
        assert_eq!(view.subtotal, Price::from_cents(7_800));
    }

    #[test]
    fn test_cart_view_excludes_unavailable_from_subtotal() {
        let mut archived = row(2, 1, 2_000, 2_000, 3);
        archived.product_status = ProductStatus::Archived;
        let short = row(3, 4, 1_000, 1_000, 2);

        let view = CartView::from_rows(vec![row(1, 1, 4_500, 4_500, 1), archived, short]);

        assert_eq!(view.item_count, 6);
        assert!(!view.lines[1].available);
        assert!(!view.lines[2].available);
        assert_eq!(view.subtotal, Price::from_cents(4_500));
    }
}
