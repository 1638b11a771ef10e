//! Authentication route handlers.
//!
//! Login and registration both leave the user signed in, with any anonymous
//! cart of the session merged into the account cart.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use synclune_core::{Email, UserId, UserRole};

use crate::action::ActionState;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::extract::Json;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::services::auth::AuthService;
use crate::services::cart_session;
use crate::state::AppState;

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// The signed-in account as shown to the client.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
}

impl From<&CurrentUser> for SessionUser {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Attach the account to the session, merging the anonymous cart first.
///
/// A failed merge does not block sign-in.
async fn sign_in(state: &AppState, session: &Session, user: &User) -> Result<CurrentUser> {
    match cart_session::merge_on_login(state.pool(), session, user.id).await {
        Ok(outcome) if outcome.merged_lines > 0 || outcome.dropped_lines > 0 => {
            tracing::info!(
                merged = outcome.merged_lines,
                dropped = outcome.dropped_lines,
                "Anonymous cart merged"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Cart merge on login failed"),
    }

    let current = CurrentUser::from(user);
    set_current_user(state.pool(), session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

/// Create a customer account and sign it in.
///
/// # Errors
///
/// Returns an auth error for invalid input or a taken email.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<ActionState<SessionUser>> {
    let user = AuthService::new(state.pool())
        .register(&body.email, &body.password, &body.name)
        .await?;
    tracing::info!(user_id = %user.id, "Customer registered");

    let current = sign_in(&state, &session, &user).await?;
    Ok(ActionState::success(SessionUser::from(&current)).with_message("Bienvenue chez Synclune !"))
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` for unknown emails and wrong
/// passwords alike.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<ActionState<SessionUser>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    let current = sign_in(&state, &session, &user).await?;
    tracing::info!(user_id = %current.id, "User logged in");
    Ok(ActionState::success(SessionUser::from(&current)))
}

/// Sign out and drop the whole session.
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
