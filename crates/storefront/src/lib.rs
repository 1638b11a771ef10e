//! Synclune storefront library.
//!
//! The public shop API: catalog, cart, checkout, Stripe webhooks, account
//! lifecycle and the maintenance jobs. Exposed as a library so the admin
//! service, the CLI and the integration tests reuse its repositories and
//! services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod action;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
