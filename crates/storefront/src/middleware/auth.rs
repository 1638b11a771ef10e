//! Authentication extractors.
//!
//! The [`CurrentUser`] stored in the session at login is checked against
//! the account on every request: a session whose account was anonymized or
//! whose role changed is flushed and treated as anonymous.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use tower_sessions::Session;

use crate::action::ActionState;
use crate::db::{UserRepository, user_sessions};
use crate::error::AppError;
use crate::models::user::User;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Bonjour, {} !", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection of the auth extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// No user is logged in.
    NotLoggedIn,
    /// The session or the account could not be read.
    Failed(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotLoggedIn => {
                let body = ActionState::<()>::error("Vous devez être connecté.");
                (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
            }
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// Outcome of checking a stored session against its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// Still valid; carries the account as it is now.
    Valid(CurrentUser),
    /// The account is gone, anonymized, or its role changed.
    Revoked,
}

/// Compare the session user with the account row.
#[must_use]
pub fn check_session(stored: &CurrentUser, account: Option<&User>) -> SessionCheck {
    match account {
        Some(user) if user.can_login() && user.role == stored.role => {
            SessionCheck::Valid(CurrentUser::from(user))
        }
        _ => SessionCheck::Revoked,
    }
}

/// Read the session user and re-check it against the database.
///
/// A revoked session is flushed.
///
/// # Errors
///
/// Returns an error if the session store or the user query fails.
pub async fn load_current_user(
    session: &Session,
    pool: &PgPool,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(stored) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?
    else {
        return Ok(None);
    };

    let account = UserRepository::new(pool).get_by_id(stored.id).await?;
    match check_session(&stored, account.as_ref()) {
        SessionCheck::Valid(user) => Ok(Some(user)),
        SessionCheck::Revoked => {
            tracing::info!(user_id = %stored.id, "Session no longer matches account, flushed");
            session.flush().await?;
            Ok(None)
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    PgPool: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::NotLoggedIn)?;
        let pool = PgPool::from_ref(state);

        load_current_user(&session, &pool)
            .await
            .map_err(AuthRejection::Failed)?
            .map(Self)
            .ok_or(AuthRejection::NotLoggedIn)
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    PgPool: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self(None));
        };
        let pool = PgPool::from_ref(state);

        let user = load_current_user(&session, &pool)
            .await
            .map_err(AuthRejection::Failed)?;
        Ok(Self(user))
    }
}

/// Store the logged-in user in the session and link the session to the
/// account.
///
/// The session id is cycled first so a pre-login id cannot be fixed. The
/// record is saved right away: its id only exists once stored.
///
/// # Errors
///
/// Returns an error if the session cannot be saved or linked.
pub async fn set_current_user(
    pool: &PgPool,
    session: &Session,
    user: &CurrentUser,
) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    session.save().await?;

    let session_id = session
        .id()
        .ok_or_else(|| AppError::Internal("session saved without id".to_string()))?;
    user_sessions::record(pool, user.id, &session_id.to_string()).await?;
    Ok(())
}

/// Remove the logged-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
