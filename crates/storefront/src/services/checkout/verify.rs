//! Price and stock verification of submitted lines against live SKUs.

use std::collections::HashMap;

use synclune_core::{Price, SkuId};

use super::request::CheckoutLine;
use crate::error::BusinessError;
use crate::models::product::SkuSnapshot;
use crate::services::stripe::LineItem;

/// A submitted line confirmed against the live SKU.
#[derive(Debug, Clone)]
pub struct VerifiedLine {
    pub sku: SkuSnapshot,
    pub quantity: i32,
}

impl VerifiedLine {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.sku.price.times(self.quantity)
    }

    /// Payment-provider line built from the snapshot.
    #[must_use]
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            name: display_name(&self.sku),
            unit_amount: self.sku.price,
            quantity: self.quantity,
            image_url: self.sku.image_url.clone(),
        }
    }
}

fn display_name(sku: &SkuSnapshot) -> String {
    let attributes: Vec<&str> = [&sku.color, &sku.material, &sku.size]
        .into_iter()
        .filter_map(|a| a.as_deref())
        .filter(|a| !a.is_empty())
        .collect();
    if attributes.is_empty() {
        sku.product_title.clone()
    } else {
        format!("{} ({})", sku.product_title, attributes.join(", "))
    }
}

/// Check every line against the live SKUs, in submission order.
///
/// A line is accepted when its SKU exists, is active, belongs to a public
/// product, has enough stock, and is priced exactly as the buyer saw it.
///
/// # Errors
///
/// Returns the `BusinessError` of the first line that fails.
pub fn verify_lines(
    lines: &[CheckoutLine],
    live: &[SkuSnapshot],
) -> Result<Vec<VerifiedLine>, BusinessError> {
    let by_id: HashMap<SkuId, &SkuSnapshot> = live.iter().map(|s| (s.sku_id, s)).collect();

    lines
        .iter()
        .map(|line| {
            let sku = by_id
                .get(&line.sku_id)
                .copied()
                .ok_or_else(|| BusinessError::ProductUnavailable {
                    title: format!("Article n°{}", line.sku_id),
                })?;

            if !sku.is_purchasable() {
                return Err(BusinessError::ProductUnavailable {
                    title: sku.product_title.clone(),
                });
            }
            if sku.inventory < line.quantity {
                return Err(BusinessError::InsufficientStock {
                    title: sku.product_title.clone(),
                    available: sku.inventory.max(0),
                });
            }
            if sku.price != line.unit_price {
                return Err(BusinessError::PriceChanged {
                    title: sku.product_title.clone(),
                });
            }

            Ok(VerifiedLine {
                sku: sku.clone(),
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Sum of the verified lines at live prices.
#[must_use]
pub fn subtotal(lines: &[VerifiedLine]) -> Price {
    lines.iter().map(VerifiedLine::line_total).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use synclune_core::{ProductId, ProductStatus};

    use super::*;

    fn snapshot(id: i32, price: i64, inventory: i32) -> SkuSnapshot {
        SkuSnapshot {
            sku_id: SkuId::new(id),
            product_id: ProductId::new(10),
            product_title: "Collier Aube".to_string(),
            product_slug: "collier-aube".to_string(),
            product_status: ProductStatus::Public,
            sku_code: format!("CA-{id}"),
            color: Some("Or rose".to_string()),
            material: None,
            size: None,
            price: Price::from_cents(price),
            inventory,
            is_active: true,
            image_url: None,
        }
    }

    fn line(id: i32, quantity: i32, price: i64) -> CheckoutLine {
        CheckoutLine {
            sku_id: SkuId::new(id),
            quantity,
            unit_price: Price::from_cents(price),
        }
    }

    #[test]
    fn test_accepts_matching_lines() {
        let live = vec![snapshot(1, 4_900, 3), snapshot(2, 2_500, 10)];
        let verified = verify_lines(&[line(1, 2, 4_900), line(2, 1, 2_500)], &live).unwrap();
        assert_eq!(verified.len(), 2);
        assert_eq!(subtotal(&verified), Price::from_cents(12_300));
        assert_eq!(verified[0].to_line_item().name, "Collier Aube (Or rose)");
    }

    #[test]
    fn test_rejects_when_cart_price_differs_from_live_price() {
        let live = vec![snapshot(1, 5_200, 3)];
        assert_eq!(
            verify_lines(&[line(1, 1, 4_900)], &live).unwrap_err(),
            BusinessError::PriceChanged {
                title: "Collier Aube".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_insufficient_stock() {
        let live = vec![snapshot(1, 4_900, 1)];
        assert_eq!(
            verify_lines(&[line(1, 2, 4_900)], &live).unwrap_err(),
            BusinessError::InsufficientStock {
                title: "Collier Aube".to_string(),
                available: 1
            }
        );
    }

    #[test]
    fn test_rejects_missing_inactive_or_unpublished() {
        assert!(matches!(
            verify_lines(&[line(9, 1, 100)], &[]),
            Err(BusinessError::ProductUnavailable { .. })
        ));

        let mut inactive = snapshot(1, 4_900, 3);
        inactive.is_active = false;
        assert!(verify_lines(&[line(1, 1, 4_900)], &[inactive]).is_err());

        let mut draft = snapshot(1, 4_900, 3);
        draft.product_status = ProductStatus::Draft;
        assert!(verify_lines(&[line(1, 1, 4_900)], &[draft]).is_err());
    }
}
