//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Readiness (database ping)
//!
//! # Catalog
//! GET    /products                - Filtered, paginated listing
//! GET    /products/{slug}         - Detail (?sku= selects the gallery)
//!
//! # Cart
//! GET    /cart                    - Current cart
//! GET    /cart/count              - Units in cart
//! POST   /cart/items              - Add a SKU
//! PATCH  /cart/items/{sku_id}     - Set quantity
//! DELETE /cart/items/{sku_id}     - Remove line
//!
//! # Checkout (rate limited)
//! POST   /checkout                - Create order + embedded payment session
//!
//! # Auth (rate limited)
//! POST   /auth/register
//! POST   /auth/login
//! POST   /auth/logout
//!
//! # Account (requires auth)
//! GET    /account/orders          - Order history
//! GET    /account/export          - Data export
//! POST   /account/deletion        - Request deletion
//! DELETE /account/deletion        - Cancel deletion
//!
//! # Machine endpoints
//! POST   /api/webhooks/stripe     - Stripe events (signature verified)
//! POST   /api/cron/{job}          - Maintenance jobs (bearer secret)
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod cron;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth_rate_limiter, checkout_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/items/{sku_id}", patch(cart::update).delete(cart::remove))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/export", get(account::export))
        .route(
            "/deletion",
            post(account::request_deletion).delete(account::cancel_deletion),
        )
}

/// Webhook and cron endpoints. No session, no rate limit.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/cron/{job}", post(cron::run))
}

/// Create all session-backed routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route(
            "/checkout",
            post(checkout::create).layer(checkout_rate_limiter()),
        )
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/account", account_routes())
}

/// The full application with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes().layer(session_layer))
        .nest("/api", api_routes())
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
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
