//! Stripe webhook endpoint.
//!
//! Answers 400 for bodies that fail verification (Stripe does not retry
//! those) and 500 when handling fails, so Stripe redelivers the event.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::stripe::{Event, verify_signature};
use crate::services::webhooks::{Delivery, WebhookService};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Receive one Stripe event.
#[tracing::instrument(skip_all)]
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(secret) = state.config().stripe.webhook_secret.as_ref() else {
        tracing::error!("Webhook received but STRIPE_WEBHOOK_SECRET is not configured");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "webhook not configured");
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return reject(StatusCode::BAD_REQUEST, "missing signature");
    };

    if let Err(e) = verify_signature(secret, &body, signature) {
        tracing::warn!(error = %e, "Webhook signature rejected");
        return reject(StatusCode::BAD_REQUEST, "invalid signature");
    }

    let event = match Event::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body could not be parsed");
            return reject(StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    match WebhookService::new(state.pool(), state.stripe(), state.email())
        .receive(&event)
        .await
    {
        Ok(delivery) => {
            let duplicate = delivery == Delivery::Duplicate;
            Json(json!({ "received": true, "duplicate": duplicate })).into_response()
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                stripe_event_id = %event.id,
                "Webhook handling failed"
            );
            reject(StatusCode::INTERNAL_SERVER_ERROR, "processing failed")
        }
    }
}
