//! HTTP route handlers for the back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness
//! GET    /health/ready                - Readiness (database ping)
//!
//! # Auth (login rate limited)
//! POST   /auth/login
//! POST   /auth/logout
//! GET    /auth/me
//!
//! # Orders
//! GET    /orders                      - Filtered, paginated listing
//! GET    /orders/{id}                 - Detail with refunds and discount
//! POST   /orders/{id}/ship            - Processing -> shipped (tracking email)
//! POST   /orders/{id}/deliver         - Shipped -> delivered
//! POST   /orders/{id}/cancel          - Cancel an unpaid order
//! POST   /orders/{id}/refunds         - Record a pending refund
//!
//! # Refunds
//! GET    /refunds/{id}
//! POST   /refunds/{id}/process        - Send to Stripe and settle
//! POST   /refunds/{id}/cancel         - Drop a pending refund
//!
//! # Discounts
//! GET    /discounts
//! POST   /discounts
//! PUT    /discounts/{id}
//! DELETE /discounts/{id}              - Only while unused
//! POST   /discounts/{id}/toggle
//!
//! # Inventory
//! GET    /inventory                   - ?max_inventory= for low stock
//! PUT    /inventory/{sku_id}          - Set stock level
//! POST   /inventory/{sku_id}/toggle   - Show or hide a SKU
//!
//! # Webhooks
//! GET    /webhook-events              - ?status=&limit=
//! ```
//!
//! Every route except health and login requires an admin session.

pub mod auth;
pub mod discounts;
pub mod inventory;
pub mod orders;
pub mod refunds;
pub mod webhook_events;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use synclune_storefront::middleware::{
    auth_rate_limiter, request_id_middleware, security_headers_middleware,
};

use crate::middleware::create_session_layer;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login).layer(auth_rate_limiter()))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/ship", post(orders::ship))
        .route("/{id}/deliver", post(orders::deliver))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/refunds", post(refunds::create))
}

/// Create the refund routes router.
pub fn refund_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(refunds::show))
        .route("/{id}/process", post(refunds::process))
        .route("/{id}/cancel", post(refunds::cancel))
}

/// Create the discount routes router.
pub fn discount_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(discounts::index).post(discounts::create))
        .route("/{id}", put(discounts::update).delete(discounts::delete))
        .route("/{id}/toggle", post(discounts::toggle))
}

/// Create the inventory routes router.
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(inventory::index))
        .route("/{sku_id}", put(inventory::update))
        .route("/{sku_id}/toggle", post(inventory::toggle))
}

/// Create all session-backed routes for the back-office.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/orders", order_routes())
        .nest("/refunds", refund_routes())
        .nest("/discounts", discount_routes())
        .nest("/inventory", inventory_routes())
        .route("/webhook-events", get(webhook_events::index))
}

/// The full application with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes().layer(session_layer))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app: Router = Router::new().route("/health", get(health));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
