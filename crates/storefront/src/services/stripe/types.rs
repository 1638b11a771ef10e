//! Stripe request and response types.
//!
//! Requests are flattened to Stripe's bracketed form syntax
//! (`line_items[0][price_data][unit_amount]=5900`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use synclune_core::{CURRENCY, OrderId, Price};

use super::error::StripeError;

/// Form body as ordered key/value pairs.
pub type Form = Vec<(String, String)>;

/// A one-off coupon created for one order.
#[derive(Debug, Clone, Deserialize)]
pub struct Coupon {
    pub id: String,
}

/// Embedded Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Final state of a Checkout Session that was asked to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionClosure {
    /// The session can no longer be paid.
    Expired,
    /// The buyer completed the session first.
    AlreadyComplete,
}

impl SessionClosure {
    /// Closure implied by a session `status`; `None` while still open.
    #[must_use]
    pub fn from_status(status: Option<&str>) -> Option<Self> {
        match status {
            Some("expired") => Some(Self::Expired),
            Some("complete") => Some(Self::AlreadyComplete),
            _ => None,
        }
    }
}

impl CheckoutSession {
    /// Order id carried in metadata, falling back to `client_reference_id`.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get("order_id")
            .or(self.client_reference_id.as_ref())
            .and_then(|id| id.parse::<i32>().ok())
            .map(OrderId::new)
    }

    /// Whether the customer's payment went through.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

/// A refund issued on a payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// The subset of a charge read from `charge.refunded`.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refunded: bool,
}

impl Charge {
    /// Whether the whole amount went back to the customer.
    #[must_use]
    pub const fn is_fully_refunded(&self) -> bool {
        self.refunded || self.amount_refunded >= self.amount
    }
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// The object an event is about.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Decode a webhook body.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidEvent` if the body is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, StripeError> {
        serde_json::from_slice(payload).map_err(|e| StripeError::InvalidEvent(e.to_string()))
    }

    /// The event object as a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidEvent` if the object does not decode.
    pub fn checkout_session(&self) -> Result<CheckoutSession, StripeError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeError::InvalidEvent(e.to_string()))
    }

    /// The event object as a charge.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidEvent` if the object does not decode.
    pub fn charge(&self) -> Result<Charge, StripeError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeError::InvalidEvent(e.to_string()))
    }
}

/// Error envelope returned by Stripe.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One priced line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub unit_amount: Price,
    pub quantity: i32,
    pub image_url: Option<String>,
}

/// Parameters of an embedded checkout session for one order.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_email: String,
    pub line_items: Vec<LineItem>,
    pub coupon_id: Option<String>,
    pub return_url: String,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSessionRequest {
    /// Flatten to form pairs.
    #[must_use]
    pub fn to_form(&self) -> Form {
        let mut form: Form = vec![
            ("mode".into(), "payment".into()),
            ("ui_mode".into(), "embedded".into()),
            ("locale".into(), "fr".into()),
            ("return_url".into(), self.return_url.clone()),
            ("customer_email".into(), self.customer_email.clone()),
            ("client_reference_id".into(), self.order_id.to_string()),
            ("expires_at".into(), self.expires_at.timestamp().to_string()),
            ("metadata[order_id]".into(), self.order_id.to_string()),
            ("metadata[order_number]".into(), self.order_number.clone()),
            (
                "payment_intent_data[metadata][order_id]".into(),
                self.order_id.to_string(),
            ),
        ];

        for (i, line) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
            form.push((format!("{prefix}[price_data][currency]"), CURRENCY.into()));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.cents().to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            if let Some(image) = &line.image_url {
                form.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
        }

        if let Some(coupon) = &self.coupon_id {
            form.push(("discounts[0][coupon]".into(), coupon.clone()));
        }

        form
    }
}

/// Form of a single-use coupon worth `amount_off`.
#[must_use]
pub fn coupon_form(amount_off: Price, code: &str, order_id: OrderId) -> Form {
    vec![
        ("amount_off".into(), amount_off.cents().to_string()),
        ("currency".into(), CURRENCY.into()),
        ("duration".into(), "once".into()),
        ("max_redemptions".into(), "1".into()),
        ("name".into(), code.to_string()),
        ("metadata[order_id]".into(), order_id.to_string()),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_closure_from_status() {
        assert_eq!(
            SessionClosure::from_status(Some("expired")),
            Some(SessionClosure::Expired)
        );
        assert_eq!(
            SessionClosure::from_status(Some("complete")),
            Some(SessionClosure::AlreadyComplete)
        );
        assert_eq!(SessionClosure::from_status(Some("open")), None);
        assert_eq!(SessionClosure::from_status(None), None);
    }

    fn find<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_uses_bracket_syntax() {
        let request = CheckoutSessionRequest {
            order_id: OrderId::new(42),
            order_number: "SYN-20261018-ABCDEF".to_string(),
            customer_email: "claire@example.fr".to_string(),
            line_items: vec![
                LineItem {
                    name: "Bague Céleste (Or, 52)".to_string(),
                    unit_amount: Price::from_cents(5_900),
                    quantity: 2,
                    image_url: Some("https://cdn.synclune.fr/bague.jpg".to_string()),
                },
                LineItem {
                    name: "Livraison".to_string(),
                    unit_amount: Price::from_cents(600),
                    quantity: 1,
                    image_url: None,
                },
            ],
            coupon_id: Some("co_123".to_string()),
            return_url: "https://synclune.fr/commande/retour".to_string(),
            expires_at: DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
        };

        let form = request.to_form();
        assert_eq!(find(&form, "ui_mode"), Some("embedded"));
        assert_eq!(find(&form, "metadata[order_id]"), Some("42"));
        assert_eq!(find(&form, "line_items[0][price_data][unit_amount]"), Some("5900"));
        assert_eq!(find(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            find(&form, "line_items[1][price_data][product_data][name]"),
            Some("Livraison")
        );
        assert_eq!(find(&form, "line_items[1][price_data][product_data][images][0]"), None);
        assert_eq!(find(&form, "discounts[0][coupon]"), Some("co_123"));
        assert_eq!(find(&form, "expires_at"), Some("1800000000"));
    }

    #[test]
    fn test_session_order_id_falls_back_to_reference() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_1","client_reference_id":"7","payment_status":"paid"}"#,
        )
        .unwrap();
        assert_eq!(session.order_id(), Some(OrderId::new(7)));
        assert!(session.is_paid());
    }

    #[test]
    fn test_event_parse_and_charge() {
        let payload = br#"{
            "id": "evt_1",
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_1", "payment_intent": "pi_1", "amount": 5000, "amount_refunded": 2000, "refunded": false}}
        }"#;
        let event = Event::parse(payload).unwrap();
        assert_eq!(event.event_type, "charge.refunded");
        let charge = event.charge().unwrap();
        assert_eq!(charge.payment_intent.as_deref(), Some("pi_1"));
        assert!(!charge.is_fully_refunded());
    }

    #[test]
    fn test_coupon_form() {
        let form = coupon_form(Price::from_cents(1_250), "NOEL25", OrderId::new(3));
        assert_eq!(find(&form, "amount_off"), Some("1250"));
        assert_eq!(find(&form, "currency"), Some("eur"));
        assert_eq!(find(&form, "duration"), Some("once"));
    }
}
