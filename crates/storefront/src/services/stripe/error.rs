//! Stripe-related errors.

use thiserror::Error;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed before a response was received.
    #[error("Stripe request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Stripe answered with an error status.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Webhook signature header missing, stale or wrong.
    #[error("Invalid Stripe signature: {0}")]
    InvalidSignature(String),

    /// Webhook payload could not be decoded.
    #[error("Invalid Stripe event: {0}")]
    InvalidEvent(String),
}

impl StripeError {
    /// Whether Stripe reported the object as already gone.
    #[must_use]
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if code == "resource_missing")
    }
}
