//! Authentication extractor for the back-office.
//!
//! Admins sign in with the same accounts as customers; only the
//! [`UserRole::Admin`](synclune_core::UserRole::Admin) role gets through.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use tower_sessions::Session;

use synclune_storefront::action::ActionState;
use synclune_storefront::middleware::load_current_user;
use synclune_storefront::models::CurrentUser;

/// Extractor that requires a logged-in admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Bonjour, {} !", admin.name)
/// }
/// ```
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when the request does not carry an admin session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// Nobody is logged in.
    Unauthorized,
    /// Logged in without the admin role.
    Forbidden,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Vous devez être connecté."),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Accès réservé aux administrateurs."),
        };
        (status, Json(ActionState::<()>::error(message))).into_response()
    }
}

/// Role check applied to the session user.
fn authorize(user: Option<CurrentUser>) -> Result<CurrentUser, AdminAuthRejection> {
    let user = user.ok_or(AdminAuthRejection::Unauthorized)?;
    if !user.is_admin() {
        tracing::warn!(user_id = %user.id, "Non-admin session rejected");
        return Err(AdminAuthRejection::Forbidden);
    }
    Ok(user)
}

/// The session user is re-checked against the account, so a demoted or
/// anonymized admin loses access on the next request.
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    PgPool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AdminAuthRejection::Unauthorized.into_response())?;
        let pool = PgPool::from_ref(state);

        let user = load_current_user(&session, &pool)
            .await
            .map_err(IntoResponse::into_response)?;

        authorize(user).map(Self).map_err(IntoResponse::into_response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use synclune_core::{Email, UserId, UserRole};

    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("atelier@synclune.fr").unwrap(),
            name: "Atelier".to_string(),
            role,
        }
    }

    #[test]
    fn test_anonymous_is_unauthorized() {
        assert_eq!(authorize(None).unwrap_err(), AdminAuthRejection::Unauthorized);
    }

    #[test]
    fn test_customer_is_forbidden() {
        assert_eq!(
            authorize(Some(user(UserRole::Customer))).unwrap_err(),
            AdminAuthRejection::Forbidden
        );
    }

    #[test]
    fn test_admin_passes() {
        assert_eq!(authorize(Some(user(UserRole::Admin))).unwrap().id, UserId::new(1));
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            AdminAuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AdminAuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
