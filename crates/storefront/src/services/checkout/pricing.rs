//! Shipping rates, order totals and order numbers.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use synclune_core::Price;

/// VAT rate included in every price.
pub const VAT_RATE_PERCENT: u8 = 20;

/// Discounted subtotal from which domestic shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Price = Price::from_cents(15_000);

const DOMESTIC_RATE: Price = Price::from_cents(600);
const EUROPE_RATE: Price = Price::from_cents(1_500);

const DOMESTIC_COUNTRIES: &[&str] = &["FR", "MC"];
const EUROPE_COUNTRIES: &[&str] = &["BE", "LU", "DE", "ES", "IT", "NL", "PT", "AT", "IE"];

/// Letters and digits that cannot be confused when read aloud or printed.
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;

/// Shipping zones served by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingZone {
    /// Metropolitan France and Monaco.
    Domestic,
    /// Other EU countries served.
    Europe,
}

impl ShippingZone {
    /// Zone of an ISO 3166-1 alpha-2 code, case-insensitive.
    #[must_use]
    pub fn for_country(country: &str) -> Option<Self> {
        let code = country.trim().to_ascii_uppercase();
        if DOMESTIC_COUNTRIES.contains(&code.as_str()) {
            Some(Self::Domestic)
        } else if EUROPE_COUNTRIES.contains(&code.as_str()) {
            Some(Self::Europe)
        } else {
            None
        }
    }

    /// Shipping cost for a subtotal already net of discount.
    #[must_use]
    pub fn rate(self, discounted_subtotal: Price) -> Price {
        match self {
            Self::Domestic if discounted_subtotal >= FREE_SHIPPING_THRESHOLD => Price::ZERO,
            Self::Domestic => DOMESTIC_RATE,
            Self::Europe => EUROPE_RATE,
        }
    }
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Price,
    pub discount: Price,
    pub shipping: Price,
    /// VAT contained in `total`.
    pub tax: Price,
    pub total: Price,
}

impl Totals {
    /// `total = subtotal - discount + shipping`, VAT included.
    #[must_use]
    pub fn compute(subtotal: Price, discount: Price, zone: ShippingZone) -> Self {
        let discount = discount.min(subtotal);
        let discounted = subtotal.saturating_sub(discount);
        let shipping = zone.rate(discounted);
        let total = discounted.saturating_add(shipping);
        Self {
            subtotal,
            discount,
            shipping,
            tax: total.vat_included(VAT_RATE_PERCENT),
            total,
        }
    }
}

/// `SYN-YYYYMMDD-XXXXXX` with a random suffix.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_ALPHABET.len());
            char::from(ORDER_NUMBER_ALPHABET.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("SYN-{}-{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_zones() {
        assert_eq!(ShippingZone::for_country("fr"), Some(ShippingZone::Domestic));
        assert_eq!(ShippingZone::for_country("MC"), Some(ShippingZone::Domestic));
        assert_eq!(ShippingZone::for_country("BE"), Some(ShippingZone::Europe));
        assert_eq!(ShippingZone::for_country("CH"), None);
    }

    #[test]
    fn test_domestic_shipping_free_from_threshold_after_discount() {
        let zone = ShippingZone::Domestic;
        assert_eq!(zone.rate(Price::from_cents(14_999)), Price::from_cents(600));
        assert_eq!(zone.rate(FREE_SHIPPING_THRESHOLD), Price::ZERO);

        // 160 € minus a 20 € code falls under the threshold
        let totals = Totals::compute(Price::from_euros(160), Price::from_euros(20), zone);
        assert_eq!(totals.shipping, Price::from_cents(600));
        assert_eq!(totals.total, Price::from_cents(14_600));
    }

    #[test]
    fn test_europe_always_pays_shipping() {
        let totals = Totals::compute(Price::from_euros(300), Price::ZERO, ShippingZone::Europe);
        assert_eq!(totals.shipping, Price::from_cents(1_500));
        assert_eq!(totals.total, Price::from_cents(31_500));
    }

    #[test]
    fn test_tax_is_included_vat() {
        let totals = Totals::compute(Price::from_euros(114), Price::ZERO, ShippingZone::Domestic);
        assert_eq!(totals.total, Price::from_euros(120));
        assert_eq!(totals.tax, Price::from_euros(20));
    }

    #[test]
    fn test_discount_capped_at_subtotal() {
        let totals = Totals::compute(Price::from_euros(10), Price::from_euros(25), ShippingZone::Domestic);
        assert_eq!(totals.discount, Price::from_euros(10));
        assert_eq!(totals.total, Price::from_cents(600));
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("SYN-20260309-"));
        let suffix = &number["SYN-20260309-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }
}
