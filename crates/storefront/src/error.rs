//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Business-rule failures travel
//! as [`BusinessError`] and reach the client as a French message inside an
//! [`ActionState`]; infrastructure failures are captured to Sentry and
//! answered with a generic message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use synclune_core::{OrderStatus, Price};

use crate::action::ActionState;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart_session::MergeError;
use crate::services::jobs::JobError;
use crate::services::stripe::StripeError;

/// A rule of the shop was violated. Messages are shown to the buyer as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessError {
    #[error("Votre panier est vide.")]
    EmptyCart,

    #[error("Une commande ne peut pas contenir plus de {max} articles différents.")]
    TooManyLines { max: usize },

    #[error("Un même article apparaît plusieurs fois dans la commande.")]
    DuplicateSku,

    #[error("La quantité doit être comprise entre 1 et {max}.")]
    InvalidQuantity { max: i32 },

    #[error("Adresse e-mail invalide.")]
    InvalidEmail,

    #[error("Le champ « {0} » est obligatoire.")]
    MissingField(&'static str),

    #[error("Nous ne livrons pas encore dans ce pays ({0}).")]
    UnsupportedCountry(String),

    #[error("« {title} » n'est plus disponible.")]
    ProductUnavailable { title: String },

    #[error("Stock insuffisant pour « {title} » ({available} disponible(s)).")]
    InsufficientStock { title: String, available: i32 },

    #[error("Le prix de « {title} » a changé. Veuillez vérifier votre panier.")]
    PriceChanged { title: String },

    #[error("Ce code promo n'existe pas.")]
    DiscountNotFound,

    #[error("Ce code promo n'est plus actif.")]
    DiscountInactive,

    #[error("Ce code promo n'est pas encore valable.")]
    DiscountNotStarted,

    #[error("Ce code promo a expiré.")]
    DiscountExpired,

    #[error("Ce code promo a atteint sa limite d'utilisation.")]
    DiscountUsageLimitReached,

    #[error("Vous avez déjà utilisé ce code promo.")]
    DiscountCustomerLimitReached,

    #[error("Ce code promo nécessite un minimum de commande de {minimum}.")]
    DiscountMinimumNotMet { minimum: Price },

    #[error("Ce code promo ne peut pas être appliqué.")]
    DiscountMisconfigured,

    #[error("Un code promo déjà utilisé ne peut pas être supprimé.")]
    DiscountInUse,

    #[error("Transition de statut impossible : {from} → {to}.")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Une commande payée ne peut pas être annulée ; effectuez un remboursement.")]
    OrderAlreadyPaid,

    #[error("Cette commande n'a pas été payée.")]
    OrderNotPaid,

    #[error("Le remboursement ne contient aucun article.")]
    EmptyRefund,

    #[error("Quantité remboursable dépassée pour « {title} ».")]
    RefundQuantityExceeded { title: String },

    #[error("Le montant du remboursement dépasse le montant remboursable ({remaining}).")]
    RefundAmountExceeded { remaining: Price },

    #[error("Ce remboursement n'est plus en attente.")]
    RefundNotPending,

    #[error("Aucune demande de suppression de compte n'est en cours.")]
    NoPendingDeletion,

    #[error("Ce compte a été supprimé.")]
    AccountClosed,

    #[error("{0}")]
    Validation(String),

    #[error("Cette opération est en conflit avec une autre requête. Veuillez réessayer.")]
    Conflict,
}

impl BusinessError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A business rule rejected the action.
    #[error("Business error: {0}")]
    Business(#[from] BusinessError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Repository(e) => Self::Database(e),
            MergeError::Session(e) => e.into(),
        }
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::UnknownJob(name) => Self::NotFound(format!("job {name}")),
            JobError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(detail = %rejection.body_text(), "Request body rejected");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "La requête doit être envoyée au format JSON."
            }
            JsonRejection::JsonSyntaxError(_) => "Le corps de la requête n'est pas un JSON valide.",
            JsonRejection::JsonDataError(_) => "Requête invalide : un champ est manquant ou mal formé.",
            _ => "Requête invalide.",
        };
        Self::BadRequest(message.to_string())
    }
}

impl AppError {
    /// Whether this error is a server-side fault worth reporting.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_)
            ) | Self::Internal(_)
                | Self::Stripe(_)
        ) || matches!(self, Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash))
    }

    /// HTTP status code returned to the client.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Stripe(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountClosed => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) | AuthError::InvalidName => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Business(err) => err.status_code(),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show to the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Ressource introuvable.".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => BusinessError::Conflict.to_string(),
            Self::Database(_) | Self::Internal(_) => {
                "Une erreur interne est survenue. Veuillez réessayer.".to_string()
            }
            Self::Stripe(_) => {
                "Le service de paiement est momentanément indisponible.".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Email ou mot de passe incorrect.".to_string(),
                AuthError::AccountClosed => "Ce compte a été supprimé.".to_string(),
                AuthError::UserAlreadyExists => {
                    "Un compte existe déjà avec cette adresse e-mail.".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Adresse e-mail invalide.".to_string(),
                AuthError::InvalidName => "Le nom est obligatoire.".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Erreur d'authentification.".to_string()
                }
            },
            Self::Business(err) => err.to_string(),
            Self::NotFound(what) => format!("Introuvable : {what}"),
            Self::Unauthorized(_) => "Veuillez vous connecter.".to_string(),
            Self::Forbidden(_) => "Accès refusé.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Trop de requêtes. Veuillez patienter.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if let Self::Business(err) = &self {
            tracing::info!(error = ?err, "Action rejected");
        }

        let status = self.status_code();
        let body: ActionState<()> = ActionState::error(self.public_message());
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order created", Some(&[("order_id", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("produit".to_string());
        assert_eq!(err.to_string(), "Not found: produit");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_business_errors_are_unprocessable_or_conflict() {
        assert_eq!(
            get_status(BusinessError::EmptyCart.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(BusinessError::Conflict.into()), StatusCode::CONFLICT);
    }

    #[test]
    fn test_business_messages_are_user_facing() {
        let err = AppError::from(BusinessError::PriceChanged {
            title: "Collier Aube".to_string(),
        });
        assert_eq!(
            err.public_message(),
            "Le prix de « Collier Aube » a changé. Veuillez vérifier votre panier."
        );

        let err = BusinessError::DiscountMinimumNotMet {
            minimum: Price::from_euros(50),
        };
        assert_eq!(
            err.to_string(),
            "Ce code promo nécessite un minimum de commande de 50,00\u{a0}€."
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection reset by peer".to_string());
        assert!(!err.public_message().contains("connection reset"));
    }
}
