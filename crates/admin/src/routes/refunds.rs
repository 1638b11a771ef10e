//! Refund route handlers.

use axum::extract::{Path, State};

use synclune_core::{OrderId, RefundId, RefundStatus};
use synclune_storefront::action::ActionState;
use synclune_storefront::error::{Result, add_breadcrumb};
use synclune_storefront::extract::Json;
use synclune_storefront::models::refund::Refund;

use crate::middleware::RequireAdmin;
use crate::services::refunds::{CreateRefundRequest, RefundService, RefundWithItems};
use crate::state::AppState;

fn service(state: &AppState) -> RefundService<'_> {
    RefundService::new(state.pool(), state.stripe(), state.email())
}

/// Record a pending refund for an order.
///
/// # Errors
///
/// Returns a business error when the refund exceeds what is refundable.
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(order_id): Path<OrderId>,
    Json(body): Json<CreateRefundRequest>,
) -> Result<ActionState<RefundWithItems>> {
    let refund = service(&state).create(order_id, &body, admin.id).await?;
    add_breadcrumb(
        "refunds",
        "Refund created",
        Some(&[("order_id", &order_id.to_string())]),
    );
    Ok(ActionState::success(refund).with_message("Remboursement enregistré."))
}

/// Refund detail.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown refund.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<RefundId>,
) -> Result<Json<RefundWithItems>> {
    Ok(Json(service(&state).get(id).await?))
}

/// Send a pending refund to the payment provider.
///
/// # Errors
///
/// Returns `BusinessError::RefundNotPending` or a provider error.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn process(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<RefundId>,
) -> Result<ActionState<Refund>> {
    let refund = service(&state).process(id).await?;
    add_breadcrumb("refunds", "Refund processed", Some(&[("refund_id", &id.to_string())]));

    Ok(match refund.status {
        RefundStatus::Completed => {
            ActionState::success(refund).with_message("Remboursement effectué.")
        }
        RefundStatus::Failed => ActionState::error("Le remboursement a été refusé par Stripe."),
        _ => ActionState::success(refund).with_message("Remboursement en cours de traitement."),
    })
}

/// Cancel a pending refund.
///
/// # Errors
///
/// Returns `BusinessError::RefundNotPending` once processed.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<RefundId>,
) -> Result<ActionState<Refund>> {
    let refund = service(&state).cancel(id).await?;
    Ok(ActionState::success(refund).with_message("Remboursement annulé."))
}
