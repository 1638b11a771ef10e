//! Cart route handlers.
//!
//! Reads never create an anonymous cart id; the first write does.

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use synclune_core::SkuId;

use crate::action::ActionState;
use crate::error::Result;
use crate::extract::Json;
use crate::models::cart::CartView;
use crate::services::cart::CartService;
use crate::services::cart_session;
use crate::state::AppState;

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub sku_id: SkuId,
    pub quantity: i32,
}

/// Body of `PATCH /cart/items/{sku_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

/// Current cart.
///
/// # Errors
///
/// Returns an error if the session store or a query fails.
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let buyer = cart_session::peek(&session).await?;
    let view = CartService::new(state.pool()).view(buyer.as_ref()).await?;
    Ok(Json(view))
}

/// Units in the cart, for the header badge.
///
/// # Errors
///
/// Returns an error if the session store or a query fails.
pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CartCount>> {
    let buyer = cart_session::peek(&session).await?;
    let count = CartService::new(state.pool()).count(buyer.as_ref()).await?;
    Ok(Json(CartCount { count }))
}

/// Add units of a SKU.
///
/// # Errors
///
/// Returns a business error if the SKU cannot be bought in that quantity.
#[tracing::instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<ActionState<CartView>> {
    let buyer = cart_session::resolve(&session).await?;
    let view = CartService::new(state.pool())
        .add(&buyer, body.sku_id, body.quantity)
        .await?;
    Ok(ActionState::success(view).with_message("Article ajouté au panier."))
}

/// Replace the quantity of a line.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the SKU is not in the cart.
#[tracing::instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(sku_id): Path<SkuId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<ActionState<CartView>> {
    let buyer = cart_session::resolve(&session).await?;
    let view = CartService::new(state.pool())
        .update(&buyer, sku_id, body.quantity)
        .await?;
    Ok(ActionState::success(view).with_message("Panier mis à jour."))
}

/// Remove a line.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the SKU is not in the cart.
#[tracing::instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(sku_id): Path<SkuId>,
) -> Result<ActionState<CartView>> {
    let buyer = cart_session::resolve(&session).await?;
    let view = CartService::new(state.pool()).remove(&buyer, sku_id).await?;
    Ok(ActionState::success(view).with_message("Article retiré du panier."))
}
