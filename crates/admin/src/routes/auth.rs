//! Back-office authentication route handlers.
//!
//! Admins sign in with their shop account. Accounts without the admin role
//! are turned away before a session is written.

use axum::extract::State;
use tower_sessions::Session;

use synclune_core::UserRole;
use synclune_storefront::action::ActionState;
use synclune_storefront::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use synclune_storefront::extract::Json;
use synclune_storefront::middleware::{clear_current_user, set_current_user};
use synclune_storefront::models::CurrentUser;
use synclune_storefront::routes::auth::{LoginRequest, SessionUser};
use synclune_storefront::services::auth::AuthService;

use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Sign in with email and password.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` for a bad login and
/// `AppError::Forbidden` for a non-admin account.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<ActionState<SessionUser>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    if user.role != UserRole::Admin {
        tracing::warn!(user_id = %user.id, "Back-office login refused for non-admin");
        return Err(AppError::Forbidden(
            "Accès réservé aux administrateurs.".to_string(),
        ));
    }

    let current = CurrentUser::from(&user);
    set_current_user(state.pool(), &session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(user_id = %current.id, "Admin logged in");
    Ok(ActionState::success(SessionUser::from(&current)))
}

/// Sign out.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn logout(session: Session) -> Result<ActionState<()>> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(ActionState::done("Vous êtes déconnecté."))
}

/// The signed-in admin.
pub async fn me(RequireAdmin(admin): RequireAdmin) -> Json<SessionUser> {
    Json(SessionUser::from(&admin))
}
