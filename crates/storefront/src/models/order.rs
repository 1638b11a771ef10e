//! Order domain types.
//!
//! Order items are denormalized snapshots: title, SKU attributes and unit
//! price are copied at checkout and never follow later catalog edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use synclune_core::{
    FulfillmentStatus, OrderId, OrderItemId, OrderStatus, PaymentStatus, Price, ProductId, SkuId,
    UserId,
};

/// Postal address entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub postal_code: String,
    pub city: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// `First Last`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// A stored order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    #[serde(skip)]
    pub guest_session_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub shipping_first_name: String,
    pub shipping_last_name: String,
    pub shipping_address1: String,
    pub shipping_address2: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_city: String,
    pub shipping_country: String,
    #[sqlx(rename = "subtotal_cents")]
    pub subtotal: Price,
    #[sqlx(rename = "discount_amount_cents")]
    pub discount_amount: Price,
    #[sqlx(rename = "shipping_cents")]
    pub shipping: Price,
    #[sqlx(rename = "tax_cents")]
    pub tax_amount: Price,
    #[sqlx(rename = "total_cents")]
    pub total: Price,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    #[serde(skip)]
    pub stripe_checkout_session_id: Option<String>,
    #[serde(skip)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(skip)]
    pub stripe_coupon_id: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub sku_id: Option<SkuId>,
    pub product_id: Option<ProductId>,
    pub product_title: String,
    pub product_slug: String,
    pub sku_code: String,
    pub sku_color: Option<String>,
    pub sku_material: Option<String>,
    pub sku_size: Option<String>,
    pub image_url: Option<String>,
    #[sqlx(rename = "unit_price_cents")]
    pub unit_price: Price,
    pub quantity: i32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// `Title (Or, Argent 925, 52)` style label used on invoices and Stripe.
    #[must_use]
    pub fn display_name(&self) -> String {
        let attributes: Vec<&str> = [&self.sku_color, &self.sku_material, &self.sku_size]
            .into_iter()
            .filter_map(|a| a.as_deref())
            .filter(|a| !a.is_empty())
            .collect();
        if attributes.is_empty() {
            self.product_title.clone()
        } else {
            format!("{} ({})", self.product_title, attributes.join(", "))
        }
    }
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(color: Option<&str>, size: Option<&str>) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            sku_id: Some(SkuId::new(3)),
            product_id: Some(ProductId::new(2)),
            product_title: "Bague Céleste".to_string(),
            product_slug: "bague-celeste".to_string(),
            sku_code: "BC-OR-52".to_string(),
            sku_color: color.map(String::from),
            sku_material: None,
            sku_size: size.map(String::from),
            image_url: None,
            unit_price: Price::from_cents(5_900),
            quantity: 2,
        }
    }

    #[test]
    fn test_display_name_lists_attributes() {
        assert_eq!(item(Some("Or"), Some("52")).display_name(), "Bague Céleste (Or, 52)");
        assert_eq!(item(None, None).display_name(), "Bague Céleste");
    }

    #[test]
    fn test_line_total() {
        assert_eq!(item(None, None).line_total(), Price::from_cents(11_800));
    }
}
