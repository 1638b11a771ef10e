//! Back-office queries.
//!
//! The schema and the shared repositories (orders, refunds, discounts,
//! webhook events) live in `synclune-storefront`; this module adds the
//! reads and writes only the back-office performs.

pub mod inventory;
pub mod orders;
pub mod refunds;

pub use inventory::InventoryRepository;
pub use orders::AdminOrderRepository;
