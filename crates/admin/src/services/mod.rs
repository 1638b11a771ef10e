//! Back-office business logic.
//!
//! # Services
//!
//! - `orders` - Order detail and status transitions (ship, deliver, cancel)
//! - `refunds` - Refund calculation, provider refunds and settlement
//! - `discounts` - Promo code validation and management

pub mod discounts;
pub mod orders;
pub mod refunds;
