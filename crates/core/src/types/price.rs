//! Euro amounts stored as integer cents.
//!
//! The shop only sells in euros, and the payment provider works in the
//! smallest currency unit, so prices are kept as `i64` cents end to end.
//! Decimal arithmetic (`rust_decimal`) is used where a ratio is applied.

use core::fmt;
use core::iter::Sum;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 code used for every amount in the shop.
pub const CURRENCY: &str = "eur";

/// An amount in euro cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Zero euros.
    pub const ZERO: Self = Self(0);

    /// Create a price from cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create a price from whole euros.
    #[must_use]
    pub const fn from_euros(euros: i64) -> Self {
        Self(euros * 100)
    }

    /// Amount in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Unit price multiplied by a quantity.
    #[must_use]
    pub fn times(self, quantity: i32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Sum of two amounts, saturating on overflow.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Difference of two amounts, clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0.saturating_sub(other.0);
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// A percentage of this amount, rounded down to the cent.
    #[must_use]
    pub fn percentage(self, percent: u8) -> Self {
        let amount = self.as_decimal() * Decimal::from(percent) / Decimal::ONE_HUNDRED;
        Self::from_decimal_floor(amount)
    }

    /// The VAT included in this tax-inclusive amount for a rate in percent.
    ///
    /// `total * rate / (100 + rate)`, rounded half-even to the cent.
    #[must_use]
    pub fn vat_included(self, rate_percent: u8) -> Self {
        let rate = Decimal::from(rate_percent);
        let vat = self.as_decimal() * rate / (Decimal::ONE_HUNDRED + rate);
        let rounded = vat.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        Self::from_decimal_floor(rounded)
    }

    /// Amount in euros as a decimal with two places.
    #[must_use]
    pub fn as_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    fn from_decimal_floor(euros: Decimal) -> Self {
        let cents = (euros * Decimal::ONE_HUNDRED).floor();
        Self(i64::try_from(cents).unwrap_or(i64::MAX))
    }
}

impl From<i64> for Price {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

/// French formatting: narrow no-break space thousands separator, comma
/// decimal separator, trailing euro sign (`1 234,50 €`).
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let euros = abs / 100;
        let cents = abs % 100;

        let digits = euros.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('\u{202f}');
            }
            grouped.push(ch);
        }

        write!(f, "{sign}{grouped},{cents:02}\u{a0}€")
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_and_sum() {
        let unit = Price::from_cents(4_590);
        assert_eq!(unit.times(3), Price::from_cents(13_770));

        let total: Price = [Price::from_cents(100), Price::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(350));
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        assert_eq!(
            Price::from_cents(500).saturating_sub(Price::from_cents(800)),
            Price::ZERO
        );
    }

    #[test]
    fn test_percentage_rounds_down() {
        // 15% of 33,33 € = 4,9995 € -> 4,99 €
        assert_eq!(Price::from_cents(3_333).percentage(15), Price::from_cents(499));
        assert_eq!(Price::from_euros(80).percentage(100), Price::from_euros(80));
        assert_eq!(Price::from_euros(80).percentage(0), Price::ZERO);
    }

    #[test]
    fn test_vat_included() {
        // 120,00 € TTC at 20% contains 20,00 € of VAT
        assert_eq!(Price::from_euros(120).vat_included(20), Price::from_euros(20));
        // 10,00 € TTC -> 1,666.. -> 1,67 €
        assert_eq!(Price::from_euros(10).vat_included(20), Price::from_cents(167));
    }

    #[test]
    fn test_display_french_format() {
        assert_eq!(Price::from_cents(4_590).to_string(), "45,90\u{a0}€");
        assert_eq!(Price::from_cents(123_450).to_string(), "1\u{202f}234,50\u{a0}€");
        assert_eq!(Price::from_cents(5).to_string(), "0,05\u{a0}€");
        assert_eq!(Price::from_cents(-600).to_string(), "-6,00\u{a0}€");
    }
}
