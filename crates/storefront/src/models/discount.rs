//! Promo code types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{
    DiscountId, DiscountKind, DiscountKindError, DiscountType, DiscountUsageId, OrderId, Price,
    UserId,
};

/// A promo code and its eligibility rules.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Discount {
    pub id: DiscountId,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent for percentage codes, cents for fixed amounts.
    pub value: i64,
    #[sqlx(rename = "min_order_amount_cents")]
    pub min_order_amount: Option<Price>,
    pub max_usage_count: Option<i32>,
    pub max_usage_per_user: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Typed view of `(discount_type, value)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is out of range for its type.
    pub fn kind(&self) -> Result<DiscountKind, DiscountKindError> {
        DiscountKind::from_parts(self.discount_type, self.value)
    }
}

/// Record of a code applied to an order. `amount_applied` is frozen at checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiscountUsage {
    pub id: DiscountUsageId,
    pub discount_id: DiscountId,
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub customer_email: String,
    pub discount_code: String,
    #[sqlx(rename = "amount_applied_cents")]
    pub amount_applied: Price,
    pub created_at: DateTime<Utc>,
}

/// Normalize a submitted promo code: trimmed and uppercased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  noel25 "), "NOEL25");
    }
}
