//! Account route handlers.
//!
//! These routes require authentication.

use axum::{Json, extract::State};

use crate::action::ActionState;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::order::OrderWithItems;
use crate::services::account::{AccountExport, AccountService, DeletionStatus};
use crate::state::AppState;

fn service(state: &AppState) -> AccountService<'_> {
    AccountService::new(
        state.pool(),
        state.email(),
        state.config().jobs.account_deletion_grace_days,
    )
}

/// Order history.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>> {
    Ok(Json(service(&state).orders(user.id).await?))
}

/// Download everything stored about the account.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn export(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AccountExport>> {
    Ok(Json(service(&state).export(user.id).await?))
}

/// Request deletion of the account.
///
/// # Errors
///
/// Returns `BusinessError::AccountClosed` for an anonymized account.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn request_deletion(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ActionState<DeletionStatus>> {
    let status = service(&state).request_deletion(user.id).await?;
    Ok(ActionState::success(status).with_message(
        "Votre demande de suppression a été enregistrée. Vous pouvez l'annuler jusqu'à la date indiquée.",
    ))
}

/// Withdraw a pending deletion request.
///
/// # Errors
///
/// Returns `BusinessError::NoPendingDeletion` if nothing is pending.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn cancel_deletion(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ActionState<DeletionStatus>> {
    let status = service(&state).cancel_deletion(user.id).await?;
    Ok(ActionState::success(status).with_message("Votre demande de suppression a été annulée."))
}
