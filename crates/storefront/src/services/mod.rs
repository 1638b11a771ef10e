//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password registration and login
//! - `cart_session` - Buyer identity (account or anonymous session) and cart merge
//! - `catalog` - Product listing, detail and gallery, cached in-process
//! - `cart` - Cart reads and writes with stock checks
//! - `checkout` - Verification, discount evaluation, order writing, payment session
//! - `stripe` - Stripe REST client and webhook signatures
//! - `webhooks` - Stripe event handling with idempotency
//! - `jobs` - Batched maintenance jobs
//! - `account` - GDPR deletion requests and data export
//! - `email` - Transactional email

pub mod account;
pub mod auth;
pub mod cart;
pub mod cart_session;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod jobs;
pub mod stripe;
pub mod webhooks;

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "helloo"));
    }
}
