//! Refund records created from the back-office.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{OrderId, OrderItemId, Price, RefundId, RefundItemId, RefundReason, RefundStatus, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Refund {
    pub id: RefundId,
    pub order_id: OrderId,
    #[sqlx(rename = "amount_cents")]
    pub amount: Price,
    pub includes_shipping: bool,
    pub reason: RefundReason,
    pub status: RefundStatus,
    pub restock: bool,
    pub note: Option<String>,
    pub stripe_refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RefundItem {
    pub id: RefundItemId,
    pub refund_id: RefundId,
    pub order_item_id: OrderItemId,
    pub quantity: i32,
    #[sqlx(rename = "amount_cents")]
    pub amount: Price,
}
