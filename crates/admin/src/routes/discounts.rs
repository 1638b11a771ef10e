//! Discount management route handlers.

use axum::extract::{Path, State};

use synclune_core::DiscountId;
use synclune_storefront::action::ActionState;
use synclune_storefront::error::Result;
use synclune_storefront::extract::Json;
use synclune_storefront::models::discount::Discount;

use crate::middleware::RequireAdmin;
use crate::services::discounts::{DiscountAdminService, DiscountRequest};
use crate::state::AppState;

/// All discounts.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Discount>>> {
    Ok(Json(DiscountAdminService::new(state.pool()).list().await?))
}

/// # Errors
///
/// Returns a validation error for invalid rules or a taken code.
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<DiscountRequest>,
) -> Result<ActionState<Discount>> {
    let discount = DiscountAdminService::new(state.pool()).create(&body).await?;
    Ok(ActionState::success(discount).with_message("Code promo créé."))
}

/// # Errors
///
/// Returns a validation error for invalid rules or a taken code.
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DiscountId>,
    Json(body): Json<DiscountRequest>,
) -> Result<ActionState<Discount>> {
    let discount = DiscountAdminService::new(state.pool())
        .update(id, &body)
        .await?;
    Ok(ActionState::success(discount).with_message("Code promo mis à jour."))
}

/// Activate or deactivate a discount.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown discount.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DiscountId>,
) -> Result<ActionState<Discount>> {
    let discount = DiscountAdminService::new(state.pool()).toggle(id).await?;
    let message = if discount.is_active {
        "Code promo activé."
    } else {
        "Code promo désactivé."
    };
    Ok(ActionState::success(discount).with_message(message))
}

/// # Errors
///
/// Returns `BusinessError::DiscountInUse` once the code was used.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DiscountId>,
) -> Result<ActionState<()>> {
    DiscountAdminService::new(state.pool()).delete(id).await?;
    Ok(ActionState::done("Code promo supprimé."))
}
