//! Inventory route handlers.
//!
//! Stock edits reach the storefront catalog once its cache entries expire.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use synclune_core::SkuId;
use synclune_storefront::action::ActionState;
use synclune_storefront::error::{BusinessError, Result};
use synclune_storefront::extract::Json;

use crate::db::InventoryRepository;
use crate::db::inventory::InventoryRow;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Query string of `GET /inventory`.
#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    /// Only SKUs at or below this stock level.
    pub max_inventory: Option<i32>,
}

/// Body of `PUT /inventory/{sku_id}`.
#[derive(Debug, Deserialize)]
pub struct SetInventoryRequest {
    pub inventory: i32,
}

impl SetInventoryRequest {
    /// # Errors
    ///
    /// Returns `BusinessError::Validation` for a negative stock level.
    pub fn validated(&self) -> std::result::Result<i32, BusinessError> {
        if self.inventory < 0 {
            return Err(BusinessError::Validation(
                "Le stock ne peut pas être négatif.".to_string(),
            ));
        }
        Ok(self.inventory)
    }
}

/// SKUs with their stock, lowest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Vec<InventoryRow>>> {
    let rows = InventoryRepository::new(state.pool())
        .list(query.max_inventory)
        .await?;
    Ok(Json(rows))
}

/// Overwrite the stock of a SKU.
///
/// # Errors
///
/// Returns a validation error for a negative level or a not-found error.
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(sku_id): Path<SkuId>,
    Json(body): Json<SetInventoryRequest>,
) -> Result<ActionState<InventoryRow>> {
    let inventory = body.validated()?;
    let row = InventoryRepository::new(state.pool())
        .set_inventory(sku_id, inventory)
        .await?;
    tracing::info!(%sku_id, inventory, "Inventory set");
    Ok(ActionState::success(row).with_message("Stock mis à jour."))
}

/// Show or hide a SKU in the shop.
///
/// # Errors
///
/// Returns a not-found error for an unknown SKU.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(sku_id): Path<SkuId>,
) -> Result<ActionState<InventoryRow>> {
    let row = InventoryRepository::new(state.pool())
        .toggle_active(sku_id)
        .await?;
    let message = if row.is_active {
        "Variante visible en boutique."
    } else {
        "Variante masquée."
    };
    Ok(ActionState::success(row).with_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_inventory_is_rejected() {
        assert!(SetInventoryRequest { inventory: -1 }.validated().is_err());
        assert_eq!(SetInventoryRequest { inventory: 0 }.validated().ok(), Some(0));
        assert_eq!(SetInventoryRequest { inventory: 12 }.validated().ok(), Some(12));
    }
}
