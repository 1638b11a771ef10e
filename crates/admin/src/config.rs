//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - URL the back-office is served from
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key (refunds)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `STRIPE_API_BASE` - Stripe API base URL
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   shipping and refund notices; disabled unless `SMTP_HOST` is set
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! The secret checks and helpers are shared with the storefront.

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use synclune_storefront::config::{
    ConfigError, EmailConfig, SentryConfig, StripeConfig, get_database_url, get_required_env,
    get_validated_secret, parse_env_or_default, validate_http_url, validate_session_secret,
};

/// Admin service configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub session_secret: SecretString,
    pub stripe: StripeConfig,
    pub email: Option<EmailConfig>,
    pub sentry: SentryConfig,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("ADMIN_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("ADMIN_PORT", "3001")?;
        let base_url =
            validate_http_url("ADMIN_BASE_URL", &get_required_env("ADMIN_BASE_URL")?)?;
        let session_secret = get_validated_secret("ADMIN_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADMIN_SESSION_SECRET")?;

        // Webhooks are received by the storefront only.
        let stripe = StripeConfig::from_env(false)?;
        let email = EmailConfig::from_env()?;
        let sentry = SentryConfig::from_env();

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            stripe,
            email,
            sentry,
        })
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Check if running in production (HTTPS).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use synclune_storefront::config::DEFAULT_STRIPE_API_BASE;

    use super::*;

    fn config(base_url: &str) -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/synclune"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3001,
            base_url: base_url.to_string(),
            session_secret: SecretString::from("Zq8vR2mK7pX4nL9tW3yB6cF1hJ5dG0sA"),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_51Hq8vKd3RtZpLm2Nc7Yw4Xb"),
                webhook_secret: None,
                api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            },
            email: None,
            sentry: SentryConfig::default(),
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = config("http://localhost:3001");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
    }

    #[test]
    fn test_is_secure() {
        assert!(config("https://admin.synclune.fr").is_secure());
        assert!(!config("http://localhost:3001").is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config("https://admin.synclune.fr"));
        assert!(!debug_output.contains("sk_test_51Hq8vKd3RtZpLm2Nc7Yw4Xb"));
        assert!(!debug_output.contains("Zq8vR2mK7pX4nL9tW3yB6cF1hJ5dG0sA"));
    }
}
