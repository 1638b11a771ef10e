//! Stripe REST client.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use synclune_core::{OrderId, Price, RefundId, RefundReason};

use super::error::StripeError;
use super::types::{
    ApiErrorBody, CheckoutSession, CheckoutSessionRequest, Coupon, Form, Refund, SessionClosure,
    coupon_form,
};
use crate::config::StripeConfig;

/// Stripe API client for payments, coupons and refunds.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Create a single-use coupon for the discount of one order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_coupon(
        &self,
        amount_off: Price,
        code: &str,
        order_id: OrderId,
    ) -> Result<Coupon, StripeError> {
        let form = coupon_form(amount_off, code, order_id);
        self.post("/coupons", &form, Some(&format!("coupon-{order_id}")))
            .await
    }

    /// Delete a coupon. A coupon that no longer exists counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, coupon_id: &str) -> Result<(), StripeError> {
        let url = format!("{}/coupons/{coupon_id}", self.api_base);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        match Self::decode::<serde_json::Value>(response).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_missing_resource() => {
                debug!(coupon_id, "Coupon already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Create an embedded Checkout Session for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let key = format!("checkout-{}", request.order_id);
        self.post("/checkout/sessions", &request.to_form(), Some(&key))
            .await
    }

    /// Expire an open Checkout Session so it can no longer be paid.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn expire_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        self.post(&format!("/checkout/sessions/{session_id}/expire"), &Form::new(), None)
            .await
    }

    /// Fetch a Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        self.get(&format!("/checkout/sessions/{session_id}")).await
    }

    /// Make sure a Checkout Session can no longer be paid.
    ///
    /// Stripe refuses to expire a session that is not open; the session is
    /// then fetched to tell an already expired one from one that was paid.
    ///
    /// # Errors
    ///
    /// Returns the expiry error when the session is still open or its state
    /// cannot be read.
    #[instrument(skip(self))]
    pub async fn close_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<SessionClosure, StripeError> {
        let refused = match self.expire_checkout_session(session_id).await {
            Ok(_) => return Ok(SessionClosure::Expired),
            Err(e @ StripeError::Api { .. }) => e,
            Err(e) => return Err(e),
        };

        let session = self.retrieve_checkout_session(session_id).await?;
        match SessionClosure::from_status(session.status.as_deref()) {
            Some(closure) => {
                debug!(?closure, "Checkout session was not open");
                Ok(closure)
            }
            None => Err(refused),
        }
    }

    /// Refund part or all of a payment.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(refund_id = %refund_id))]
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: Price,
        reason: RefundReason,
        refund_id: RefundId,
    ) -> Result<Refund, StripeError> {
        let form: Form = vec![
            ("payment_intent".into(), payment_intent_id.to_string()),
            ("amount".into(), amount.cents().to_string()),
            ("reason".into(), reason.provider_reason().into()),
            ("metadata[refund_id]".into(), refund_id.to_string()),
        ];
        self.post("/refunds", &form, Some(&format!("refund-{refund_id}")))
            .await
    }

    /// Fetch a refund already created at the provider.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails or the refund is unknown.
    pub async fn retrieve_refund(&self, stripe_refund_id: &str) -> Result<Refund, StripeError> {
        self.get(&format!("/refunds/{stripe_refund_id}")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeError> {
        let url = format!("{}{path}", self.api_base);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => (
                    parsed.error.code,
                    parsed
                        .error
                        .message
                        .unwrap_or_else(|| status.to_string()),
                ),
                Err(_) => (None, body),
            };
            warn!(status = status.as_u16(), code = ?code, "Stripe API error");
            return Err(StripeError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Response(e.to_string()))
    }
}
