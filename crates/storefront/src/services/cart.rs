//! Cart operations for the resolved buyer.
//!
//! Every write on an anonymous cart pushes its expiry 30 days ahead.

use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use synclune_core::SkuId;

use super::cart_session::{BuyerIdentity, MAX_LINE_QUANTITY, anonymous_cart_expiry};
use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, BusinessError, Result};
use crate::models::cart::{Cart, CartView};
use crate::models::product::SkuSnapshot;

/// Cart service bound to a pool.
pub struct CartService<'a> {
    pool: &'a PgPool,
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            carts: CartRepository::new(pool),
        }
    }

    /// The buyer's cart, empty when none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn view(&self, buyer: Option<&BuyerIdentity>) -> Result<CartView> {
        let Some(cart) = self.find(buyer).await? else {
            return Ok(CartView::default());
        };
        let rows = self.carts.lines(cart.id).await?;
        Ok(CartView::from_rows(rows))
    }

    /// Units in the buyer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn count(&self, buyer: Option<&BuyerIdentity>) -> Result<i64> {
        match self.find(buyer).await? {
            Some(cart) => Ok(self.carts.count(cart.id).await?),
            None => Ok(0),
        }
    }

    /// Add `quantity` units of a SKU, on top of what the cart already holds.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError` if the SKU cannot be bought in that quantity.
    #[instrument(skip(self), fields(sku_id = %sku_id))]
    pub async fn add(&self, buyer: &BuyerIdentity, sku_id: SkuId, quantity: i32) -> Result<CartView> {
        check_quantity(quantity)?;
        let cart = self.get_or_create(buyer).await?;

        let existing = self.carts.item_quantity(cart.id, sku_id).await?.unwrap_or(0);
        let total = existing.saturating_add(quantity);
        if total > MAX_LINE_QUANTITY {
            return Err(BusinessError::InvalidQuantity {
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }

        let sku = self.purchasable(sku_id, total).await?;
        self.carts
            .upsert_item(cart.id, sku_id, total, sku.price)
            .await?;

        tracing::info!(cart_id = %cart.id, quantity = total, "Cart line added");
        Ok(CartView::from_rows(self.carts.lines(cart.id).await?))
    }

    /// Replace the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the SKU is not in the cart.
    #[instrument(skip(self), fields(sku_id = %sku_id))]
    pub async fn update(
        &self,
        buyer: &BuyerIdentity,
        sku_id: SkuId,
        quantity: i32,
    ) -> Result<CartView> {
        check_quantity(quantity)?;
        let cart = self.get_or_create(buyer).await?;
        self.purchasable(sku_id, quantity).await?;

        if !self.carts.set_quantity(cart.id, sku_id, quantity).await? {
            return Err(AppError::NotFound("article du panier".to_string()));
        }
        Ok(CartView::from_rows(self.carts.lines(cart.id).await?))
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the SKU is not in the cart.
    #[instrument(skip(self), fields(sku_id = %sku_id))]
    pub async fn remove(&self, buyer: &BuyerIdentity, sku_id: SkuId) -> Result<CartView> {
        let cart = self.get_or_create(buyer).await?;
        if !self.carts.remove_item(cart.id, sku_id).await? {
            return Err(AppError::NotFound("article du panier".to_string()));
        }
        Ok(CartView::from_rows(self.carts.lines(cart.id).await?))
    }

    async fn find(&self, buyer: Option<&BuyerIdentity>) -> Result<Option<Cart>> {
        let cart = match buyer {
            Some(BuyerIdentity::Authenticated(user_id)) => self.carts.find_for_user(*user_id).await?,
            Some(BuyerIdentity::Anonymous(session_id)) => {
                self.carts.find_for_session(session_id).await?
            }
            None => None,
        };
        Ok(cart)
    }

    async fn get_or_create(&self, buyer: &BuyerIdentity) -> Result<Cart> {
        let cart = match buyer {
            BuyerIdentity::Authenticated(user_id) => {
                self.carts.get_or_create_for_user(*user_id).await?
            }
            BuyerIdentity::Anonymous(session_id) => {
                self.carts
                    .get_or_create_for_session(session_id, anonymous_cart_expiry(Utc::now()))
                    .await?
            }
        };
        Ok(cart)
    }

    async fn purchasable(
        &self,
        sku_id: SkuId,
        quantity: i32,
    ) -> Result<SkuSnapshot> {
        let sku = ProductRepository::new(self.pool)
            .snapshot(sku_id)
            .await?
            .ok_or_else(|| AppError::NotFound("article".to_string()))?;

        if !sku.is_purchasable() {
            return Err(BusinessError::ProductUnavailable {
                title: sku.product_title,
            }
            .into());
        }
        if sku.inventory < quantity {
            return Err(BusinessError::InsufficientStock {
                title: sku.product_title,
                available: sku.inventory,
            }
            .into());
        }
        Ok(sku)
    }
}

/// A line quantity must be within `1..=MAX_LINE_QUANTITY`.
///
/// # Errors
///
/// Returns `BusinessError::InvalidQuantity` otherwise.
pub const fn check_quantity(quantity: i32) -> std::result::Result<(), BusinessError> {
    if quantity < 1 || quantity > MAX_LINE_QUANTITY {
        return Err(BusinessError::InvalidQuantity {
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_quantity_bounds() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_LINE_QUANTITY).is_ok());
        assert_eq!(
            check_quantity(0),
            Err(BusinessError::InvalidQuantity { max: 10 })
        );
        assert!(check_quantity(11).is_err());
        assert!(check_quantity(-3).is_err());
    }
}
