//! HTTP middleware stack for admin.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (shared with the storefront)
//! 4. Session layer (tower-sessions with `PostgreSQL` store, SameSite=Strict)
//! 5. Security headers (shared with the storefront)
//! 6. `RequireAdmin` extractor on every back-office handler

pub mod auth;
pub mod session;

pub use auth::{AdminAuthRejection, RequireAdmin};
pub use session::create_session_layer;
