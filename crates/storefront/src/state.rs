//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::catalog::{CACHE_TTL, CatalogService};
use crate::services::email::EmailService;
use crate::services::stripe::StripeClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    email: EmailService,
    catalog: CatalogService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, SmtpError> {
        let stripe = StripeClient::new(&config.stripe);
        let email = EmailService::new(config.email.as_ref())?;

        Ok(Self::from_parts(config, pool, stripe, email))
    }

    /// Assemble a state from already-built services.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        pool: PgPool,
        stripe: StripeClient,
        email: EmailService,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                email,
                catalog: CatalogService::new(CACHE_TTL),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Stripe REST client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Transactional email; a no-op when SMTP is not configured.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// In-process catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool().clone()
    }
}
