//! Discount kinds and the amount a promo code takes off an order.

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Storage discriminant for [`DiscountKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "synclune.discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

/// Errors building a [`DiscountKind`] from stored or submitted values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountKindError {
    #[error("percentage must be between 1 and 100 (got {0})")]
    PercentageOutOfRange(i64),
    #[error("fixed amount must be positive (got {0} cents)")]
    NonPositiveAmount(i64),
}

/// How a promo code reduces the order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percent off the subtotal (1-100).
    Percentage(u8),
    /// Fixed amount off the subtotal.
    FixedAmount(Price),
}

impl DiscountKind {
    /// Build from the `(discount_type, value)` column pair.
    ///
    /// `value` is a percentage for [`DiscountType::Percentage`] and cents for
    /// [`DiscountType::FixedAmount`].
    ///
    /// # Errors
    ///
    /// Returns an error when the value is out of range for the type.
    pub fn from_parts(discount_type: DiscountType, value: i64) -> Result<Self, DiscountKindError> {
        match discount_type {
            DiscountType::Percentage => u8::try_from(value)
                .ok()
                .filter(|pct| (1..=100).contains(pct))
                .map(Self::Percentage)
                .ok_or(DiscountKindError::PercentageOutOfRange(value)),
            DiscountType::FixedAmount if value > 0 => Ok(Self::FixedAmount(Price::from_cents(value))),
            DiscountType::FixedAmount => Err(DiscountKindError::NonPositiveAmount(value)),
        }
    }

    /// Column pair for storage.
    #[must_use]
    pub fn into_parts(self) -> (DiscountType, i64) {
        match self {
            Self::Percentage(pct) => (DiscountType::Percentage, i64::from(pct)),
            Self::FixedAmount(amount) => (DiscountType::FixedAmount, amount.cents()),
        }
    }

    /// Amount taken off `subtotal`. Never exceeds the subtotal.
    #[must_use]
    pub fn amount_for(self, subtotal: Price) -> Price {
        if subtotal.is_negative() || subtotal.is_zero() {
            return Price::ZERO;
        }
        match self {
            Self::Percentage(pct) => subtotal.percentage(pct),
            Self::FixedAmount(amount) => amount.min(subtotal),
        }
    }

    /// Short label such as `-15 %` or `-10,00 €`.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Percentage(pct) => format!("-{pct}\u{a0}%"),
            Self::FixedAmount(amount) => format!("-{amount}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_validates_ranges() {
        assert_eq!(
            DiscountKind::from_parts(DiscountType::Percentage, 15),
            Ok(DiscountKind::Percentage(15))
        );
        assert_eq!(
            DiscountKind::from_parts(DiscountType::Percentage, 0),
            Err(DiscountKindError::PercentageOutOfRange(0))
        );
        assert_eq!(
            DiscountKind::from_parts(DiscountType::Percentage, 101),
            Err(DiscountKindError::PercentageOutOfRange(101))
        );
        assert_eq!(
            DiscountKind::from_parts(DiscountType::FixedAmount, 0),
            Err(DiscountKindError::NonPositiveAmount(0))
        );
        assert_eq!(
            DiscountKind::from_parts(DiscountType::FixedAmount, 1_000),
            Ok(DiscountKind::FixedAmount(Price::from_euros(10)))
        );
    }

    #[test]
    fn test_parts_round_trip() {
        let kind = DiscountKind::FixedAmount(Price::from_cents(750));
        let (ty, value) = kind.into_parts();
        assert_eq!(DiscountKind::from_parts(ty, value).unwrap(), kind);
    }

    #[test]
    fn test_percentage_amount() {
        let kind = DiscountKind::Percentage(20);
        assert_eq!(kind.amount_for(Price::from_euros(89)), Price::from_cents(1_780));
    }

    #[test]
    fn test_fixed_amount_capped_at_subtotal() {
        let kind = DiscountKind::FixedAmount(Price::from_euros(30));
        assert_eq!(kind.amount_for(Price::from_euros(25)), Price::from_euros(25));
        assert_eq!(kind.amount_for(Price::from_euros(60)), Price::from_euros(30));
    }

    #[test]
    fn test_zero_subtotal_gets_nothing() {
        assert_eq!(DiscountKind::Percentage(50).amount_for(Price::ZERO), Price::ZERO);
    }

    #[test]
    fn test_label() {
        assert_eq!(DiscountKind::Percentage(15).label(), "-15\u{a0}%");
        assert_eq!(
            DiscountKind::FixedAmount(Price::from_euros(10)).label(),
            "-10,00\u{a0}€"
        );
    }
}
