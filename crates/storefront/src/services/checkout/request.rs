//! Checkout request body and its shape validation.

use std::collections::HashSet;

use serde::Deserialize;

use synclune_core::{Email, Price, SkuId};

use super::pricing::ShippingZone;
use crate::error::BusinessError;
use crate::models::order::ShippingAddress;
use crate::services::cart_session::MAX_LINE_QUANTITY;

/// Most distinct SKUs in one order.
pub const MAX_LINES: usize = 50;

const MAX_FIELD_LENGTH: usize = 200;

/// `POST /checkout` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    /// Required for guests; ignored for signed-in buyers.
    #[serde(default)]
    pub email: Option<String>,
    pub shipping: ShippingAddress,
    #[serde(default)]
    pub discount_code: Option<String>,
}

/// A line as the buyer saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CheckoutLine {
    pub sku_id: SkuId,
    pub quantity: i32,
    /// Unit price displayed to the buyer, compared against the live price.
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Price,
}

impl CheckoutRequest {
    /// Check the request shape before touching the database.
    ///
    /// # Errors
    ///
    /// Returns the first `BusinessError` found.
    pub fn validate(&self) -> Result<(), BusinessError> {
        if self.items.is_empty() {
            return Err(BusinessError::EmptyCart);
        }
        if self.items.len() > MAX_LINES {
            return Err(BusinessError::TooManyLines { max: MAX_LINES });
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for line in &self.items {
            if !seen.insert(line.sku_id) {
                return Err(BusinessError::DuplicateSku);
            }
            if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
                return Err(BusinessError::InvalidQuantity {
                    max: MAX_LINE_QUANTITY,
                });
            }
        }

        validate_address(&self.shipping)
    }

    /// Discount code trimmed and uppercased; blank counts as none.
    #[must_use]
    pub fn normalized_discount_code(&self) -> Option<String> {
        self.discount_code
            .as_deref()
            .map(crate::models::discount::normalize_code)
            .filter(|c| !c.is_empty())
    }

    /// The guest's email, parsed.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::MissingField` or `BusinessError::InvalidEmail`.
    pub fn guest_email(&self) -> Result<Email, BusinessError> {
        let raw = self
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(BusinessError::MissingField("email"))?;
        Email::parse(raw).map_err(|_| BusinessError::InvalidEmail)
    }
}

fn validate_address(address: &ShippingAddress) -> Result<(), BusinessError> {
    let required = [
        ("prénom", &address.first_name),
        ("nom", &address.last_name),
        ("adresse", &address.address1),
        ("code postal", &address.postal_code),
        ("ville", &address.city),
        ("pays", &address.country),
    ];
    for (label, value) in required {
        let value = value.trim();
        if value.is_empty() {
            return Err(BusinessError::MissingField(label));
        }
        if value.chars().count() > MAX_FIELD_LENGTH {
            return Err(BusinessError::Validation(format!(
                "Le champ « {label} » est trop long."
            )));
        }
    }

    if ShippingZone::for_country(&address.country).is_none() {
        return Err(BusinessError::UnsupportedCountry(address.country.clone()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(country: &str) -> ShippingAddress {
        ShippingAddress {
            first_name: "Léa".to_string(),
            last_name: "Martin".to_string(),
            address1: "12 rue des Lilas".to_string(),
            address2: None,
            postal_code: "69001".to_string(),
            city: "Lyon".to_string(),
            country: country.to_string(),
            phone: None,
        }
    }

    fn line(sku: i32, quantity: i32) -> CheckoutLine {
        CheckoutLine {
            sku_id: SkuId::new(sku),
            quantity,
            unit_price: Price::from_cents(4_500),
        }
    }

    fn request(items: Vec<CheckoutLine>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            email: Some("lea@example.fr".to_string()),
            shipping: address("FR"),
            discount_code: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request(vec![line(1, 2), line(2, 10)]).validate().is_ok());
    }

    #[test]
    fn test_empty_and_oversized_carts_rejected() {
        assert_eq!(request(vec![]).validate(), Err(BusinessError::EmptyCart));

        let lines = (1..=51).map(|i| line(i, 1)).collect();
        assert_eq!(
            request(lines).validate(),
            Err(BusinessError::TooManyLines { max: 50 })
        );
    }

    #[test]
    fn test_duplicate_sku_and_quantity_bounds() {
        assert_eq!(
            request(vec![line(1, 1), line(1, 2)]).validate(),
            Err(BusinessError::DuplicateSku)
        );
        assert!(request(vec![line(1, 0)]).validate().is_err());
        assert!(request(vec![line(1, 11)]).validate().is_err());
    }

    #[test]
    fn test_address_fields_and_country() {
        let mut req = request(vec![line(1, 1)]);
        req.shipping.city = "  ".to_string();
        assert_eq!(req.validate(), Err(BusinessError::MissingField("ville")));

        let mut req = request(vec![line(1, 1)]);
        req.shipping = address("US");
        assert_eq!(
            req.validate(),
            Err(BusinessError::UnsupportedCountry("US".to_string()))
        );
    }

    #[test]
    fn test_guest_email_and_code_normalization() {
        let mut req = request(vec![line(1, 1)]);
        req.discount_code = Some("  bijoux10 ".to_string());
        assert_eq!(req.normalized_discount_code().as_deref(), Some("BIJOUX10"));
        assert_eq!(req.guest_email().unwrap().as_str(), "lea@example.fr");

        req.email = None;
        assert_eq!(req.guest_email(), Err(BusinessError::MissingField("email")));
        req.email = Some("pas-un-email".to_string());
        assert_eq!(req.guest_email(), Err(BusinessError::InvalidEmail));
        req.discount_code = Some("   ".to_string());
        assert_eq!(req.normalized_discount_code(), None);
    }

    #[test]
    fn test_deserializes_wire_names() {
        let req: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "items": [{"sku_id": 3, "quantity": 1, "unit_price_cents": 3900}],
            "shipping": {
                "first_name": "Léa", "last_name": "Martin", "address1": "1 rue",
                "postal_code": "75001", "city": "Paris", "country": "FR"
            }
        }))
        .unwrap();
        assert_eq!(req.items[0].unit_price, Price::from_cents(3_900));
        assert!(req.email.is_none());
    }
}
