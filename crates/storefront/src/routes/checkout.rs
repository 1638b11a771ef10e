//! Checkout route handler.

use axum::extract::State;
use tower_sessions::Session;

use crate::action::ActionState;
use crate::error::{Result, add_breadcrumb};
use crate::extract::Json;
use crate::middleware::OptionalAuth;
use crate::services::cart_session::{self, BuyerIdentity};
use crate::services::checkout::{CheckoutRequest, CheckoutResponse, CheckoutService};
use crate::state::AppState;

/// Turn the submitted cart into a pending order and an embedded payment form.
///
/// # Errors
///
/// Returns a business error when the cart or the code no longer qualifies,
/// or the provider error that aborted the checkout.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<ActionState<CheckoutResponse>> {
    let buyer = match &user {
        Some(user) => BuyerIdentity::Authenticated(user.id),
        None => cart_session::resolve(&session).await?,
    };

    let response = CheckoutService::new(state.pool(), state.stripe(), &state.config().base_url)
        .place_order(&buyer, user.as_ref().map(|u| &u.email), &request)
        .await?;

    let order_id = response.order_id.to_string();
    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("order_id", order_id.as_str())]),
    );
    Ok(ActionState::success(response))
}
