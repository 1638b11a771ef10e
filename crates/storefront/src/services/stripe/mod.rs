//! Stripe integration.
//!
//! This module provides:
//! - [`StripeClient`] for coupons, embedded Checkout Sessions and refunds
//! - Webhook signature verification
//! - Event and object types read from webhooks

mod client;
mod error;
pub mod signature;
mod types;

pub use client::StripeClient;
pub use error::StripeError;
pub use signature::verify_signature;
pub use types::{
    Charge, CheckoutSession, CheckoutSessionRequest, Coupon, Event, LineItem, Refund,
    SessionClosure,
};
