//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and are read with runtime `query_as`.
//! Views returned to clients derive `Serialize`.

pub mod cart;
pub mod discount;
pub mod order;
pub mod product;
pub mod refund;
pub mod session;
pub mod user;
pub mod webhook;

pub use session::{CurrentUser, keys as session_keys};
