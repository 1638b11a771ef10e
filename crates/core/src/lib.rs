//! Synclune Core - Shared domain types.
//!
//! This crate provides common types used across all Synclune components:
//! - `storefront` - Public jewelry shop (catalog, cart, checkout, webhooks, jobs)
//! - `admin` - Back-office (orders, refunds, discounts, inventory)
//! - `cli` - Command-line tools for migrations and maintenance jobs
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, emails, statuses and discount kinds

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
