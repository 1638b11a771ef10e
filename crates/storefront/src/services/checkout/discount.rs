//! Promo code eligibility.

use chrono::{DateTime, Utc};

use synclune_core::Price;

use crate::error::BusinessError;
use crate::models::discount::Discount;

/// Amount a discount takes off `subtotal` for a customer who already used
/// it `customer_usage` times.
///
/// Checks run in a fixed order: active flag, date window, global cap,
/// per-customer cap, minimum order.
///
/// # Errors
///
/// Returns the `BusinessError` of the first rule that fails.
pub fn evaluate_discount(
    discount: &Discount,
    customer_usage: i64,
    subtotal: Price,
    now: DateTime<Utc>,
) -> Result<Price, BusinessError> {
    if !discount.is_active {
        return Err(BusinessError::DiscountInactive);
    }
    if discount.starts_at > now {
        return Err(BusinessError::DiscountNotStarted);
    }
    if discount.ends_at.is_some_and(|ends| ends <= now) {
        return Err(BusinessError::DiscountExpired);
    }
    if discount
        .max_usage_count
        .is_some_and(|max| discount.usage_count >= max)
    {
        return Err(BusinessError::DiscountUsageLimitReached);
    }
    if discount
        .max_usage_per_user
        .is_some_and(|max| customer_usage >= i64::from(max))
    {
        return Err(BusinessError::DiscountCustomerLimitReached);
    }
    if let Some(minimum) = discount.min_order_amount
        && subtotal < minimum
    {
        return Err(BusinessError::DiscountMinimumNotMet { minimum });
    }

    let kind = discount.kind().map_err(|e| {
        tracing::error!(discount_id = %discount.id, error = %e, "Stored discount is invalid");
        BusinessError::DiscountMisconfigured
    })?;
    let amount = kind.amount_for(subtotal);
    if amount.is_zero() {
        return Err(BusinessError::DiscountMisconfigured);
    }
    Ok(amount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use synclune_core::{DiscountId, DiscountType};

    use super::*;

    fn discount(discount_type: DiscountType, value: i64) -> Discount {
        let now = Utc::now();
        Discount {
            id: DiscountId::new(1),
            code: "BIJOUX10".to_string(),
            discount_type,
            value,
            min_order_amount: None,
            max_usage_count: None,
            max_usage_per_user: None,
            usage_count: 0,
            is_active: true,
            starts_at: now - Duration::days(1),
            ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_rounds_down() {
        let d = discount(DiscountType::Percentage, 15);
        let amount = evaluate_discount(&d, 0, Price::from_cents(3_333), Utc::now()).unwrap();
        assert_eq!(amount, Price::from_cents(499));
    }

    #[test]
    fn test_fixed_amount_capped_at_subtotal() {
        let d = discount(DiscountType::FixedAmount, 5_000);
        let amount = evaluate_discount(&d, 0, Price::from_cents(3_000), Utc::now()).unwrap();
        assert_eq!(amount, Price::from_cents(3_000));
    }

    #[test]
    fn test_date_window() {
        let now = Utc::now();
        let mut d = discount(DiscountType::Percentage, 10);
        d.starts_at = now + Duration::hours(1);
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(50), now),
            Err(BusinessError::DiscountNotStarted)
        );

        d.starts_at = now - Duration::days(10);
        d.ends_at = Some(now - Duration::seconds(1));
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(50), now),
            Err(BusinessError::DiscountExpired)
        );
    }

    #[test]
    fn test_usage_caps() {
        let mut d = discount(DiscountType::Percentage, 10);
        d.max_usage_count = Some(100);
        d.usage_count = 100;
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(50), Utc::now()),
            Err(BusinessError::DiscountUsageLimitReached)
        );

        d.usage_count = 3;
        d.max_usage_per_user = Some(1);
        assert_eq!(
            evaluate_discount(&d, 1, Price::from_euros(50), Utc::now()),
            Err(BusinessError::DiscountCustomerLimitReached)
        );
        assert!(evaluate_discount(&d, 0, Price::from_euros(50), Utc::now()).is_ok());
    }

    #[test]
    fn test_minimum_order_and_inactive() {
        let mut d = discount(DiscountType::FixedAmount, 1_000);
        d.min_order_amount = Some(Price::from_euros(60));
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(59), Utc::now()),
            Err(BusinessError::DiscountMinimumNotMet {
                minimum: Price::from_euros(60)
            })
        );

        d.is_active = false;
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(80), Utc::now()),
            Err(BusinessError::DiscountInactive)
        );
    }

    #[test]
    fn test_corrupt_value_is_misconfigured() {
        let d = discount(DiscountType::Percentage, 250);
        assert_eq!(
            evaluate_discount(&d, 0, Price::from_euros(80), Utc::now()),
            Err(BusinessError::DiscountMisconfigured)
        );
    }
}
