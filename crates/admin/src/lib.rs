//! Synclune back-office library.
//!
//! Order fulfilment, refunds, promo codes, stock levels and the webhook
//! log, served as a JSON API to the shop staff. The schema, models and
//! payment client are shared with `synclune-storefront`.
//!
//! # Security
//!
//! Every route except health checks and login requires a session whose
//! user has the admin role. The session cookie is `SameSite=Strict`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
