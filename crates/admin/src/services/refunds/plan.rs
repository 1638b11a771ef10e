//! Refund amount calculation.
//!
//! Pure: takes the order, its lines and what earlier refunds already cover,
//! returns the lines and amount of the new refund or the rule it breaks.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use synclune_core::{OrderItemId, Price, RefundReason};
use synclune_storefront::db::refunds::RefundedQuantity;
use synclune_storefront::error::BusinessError;
use synclune_storefront::models::order::{Order, OrderItem};

/// Maximum length of the internal note.
pub const MAX_NOTE_LENGTH: usize = 500;

/// One order line to refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RefundLineRequest {
    pub order_item_id: OrderItemId,
    pub quantity: i32,
}

/// Body of `POST /orders/{id}/refunds`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRefundRequest {
    #[serde(default)]
    pub lines: Vec<RefundLineRequest>,
    #[serde(default)]
    pub include_shipping: bool,
    pub reason: RefundReason,
    #[serde(default)]
    pub restock: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl CreateRefundRequest {
    /// Trimmed note, `None` when blank.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::Validation` when the note is too long.
    pub fn note(&self) -> Result<Option<&str>, BusinessError> {
        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
            return Err(BusinessError::Validation(format!(
                "La note ne peut pas dépasser {MAX_NOTE_LENGTH} caractères."
            )));
        }
        Ok(note)
    }
}

/// A refunded line with its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedLine {
    pub order_item_id: OrderItemId,
    pub quantity: i32,
    pub amount: Price,
}

/// What a new refund will contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub lines: Vec<PlannedLine>,
    pub includes_shipping: bool,
    pub amount: Price,
}

/// What earlier pending and completed refunds of the order cover.
#[derive(Debug, Clone, Default)]
pub struct PriorRefunds<'a> {
    pub quantities: &'a [RefundedQuantity],
    pub total: Price,
    pub shipping_refunded: bool,
}

/// Compute a refund: Σ(unit price × quantity), plus shipping when asked.
///
/// # Errors
///
/// Returns a `BusinessError` when the order is not refundable, the refund is
/// empty, a line is unknown or exceeds its refundable quantity, shipping was
/// already refunded, or the amount exceeds what remains refundable.
pub fn plan_refund(
    order: &Order,
    items: &[OrderItem],
    prior: &PriorRefunds<'_>,
    request: &CreateRefundRequest,
) -> Result<RefundPlan, BusinessError> {
    if !order.payment_status.is_refundable() {
        return Err(BusinessError::OrderNotPaid);
    }
    if request.lines.is_empty() && !request.include_shipping {
        return Err(BusinessError::EmptyRefund);
    }

    let items_by_id: HashMap<OrderItemId, &OrderItem> = items.iter().map(|i| (i.id, i)).collect();
    let refunded: HashMap<OrderItemId, i64> = prior
        .quantities
        .iter()
        .map(|r| (r.order_item_id, r.quantity))
        .collect();

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        if !seen.insert(line.order_item_id) {
            return Err(BusinessError::Validation(
                "Un même article apparaît plusieurs fois dans le remboursement.".to_string(),
            ));
        }
        let item = items_by_id.get(&line.order_item_id).ok_or_else(|| {
            BusinessError::Validation("Cet article ne fait pas partie de la commande.".to_string())
        })?;
        if line.quantity < 1 {
            return Err(BusinessError::InvalidQuantity { max: item.quantity });
        }

        let already = refunded.get(&item.id).copied().unwrap_or(0);
        let remaining = i64::from(item.quantity) - already;
        if i64::from(line.quantity) > remaining {
            return Err(BusinessError::RefundQuantityExceeded {
                title: item.display_name(),
            });
        }

        lines.push(PlannedLine {
            order_item_id: item.id,
            quantity: line.quantity,
            amount: item.unit_price.times(line.quantity),
        });
    }

    if request.include_shipping && prior.shipping_refunded {
        return Err(BusinessError::Validation(
            "Les frais de port ont déjà été remboursés.".to_string(),
        ));
    }

    let mut amount: Price = lines.iter().map(|l| l.amount).sum();
    if request.include_shipping {
        amount = amount.saturating_add(order.shipping);
    }
    if amount.is_zero() || amount.is_negative() {
        return Err(BusinessError::EmptyRefund);
    }

    let remaining = order.total.saturating_sub(prior.total);
    if amount > remaining {
        return Err(BusinessError::RefundAmountExceeded { remaining });
    }

    Ok(RefundPlan {
        lines,
        includes_shipping: request.include_shipping,
        amount,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use synclune_core::{FulfillmentStatus, OrderId, OrderStatus, PaymentStatus, SkuId};

    use super::*;

    fn order(payment_status: PaymentStatus, total: i64, shipping: i64) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(10),
            order_number: "SYN-20261018-AB12".to_string(),
            user_id: None,
            guest_session_id: None,
            customer_email: "claire@exemple.fr".to_string(),
            customer_name: "Claire Martin".to_string(),
            customer_phone: None,
            shipping_first_name: "Claire".to_string(),
            shipping_last_name: "Martin".to_string(),
            shipping_address1: "12 rue des Lilas".to_string(),
            shipping_address2: None,
            shipping_postal_code: "69003".to_string(),
            shipping_city: "Lyon".to_string(),
            shipping_country: "FR".to_string(),
            subtotal: Price::from_cents(total - shipping),
            discount_amount: Price::ZERO,
            shipping: Price::from_cents(shipping),
            tax_amount: Price::ZERO,
            total: Price::from_cents(total),
            currency: "eur".to_string(),
            status: OrderStatus::Processing,
            payment_status,
            fulfillment_status: FulfillmentStatus::Processing,
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: Some("pi_3Q".to_string()),
            stripe_coupon_id: None,
            carrier: None,
            tracking_number: None,
            tracking_url: None,
            paid_at: Some(now),
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: i32, title: &str, unit_cents: i64, quantity: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(10),
            sku_id: Some(SkuId::new(id)),
            product_id: None,
            product_title: title.to_string(),
            product_slug: title.to_lowercase().replace(' ', "-"),
            sku_code: format!("SKU-{id}"),
            sku_color: None,
            sku_material: None,
            sku_size: None,
            image_url: None,
            unit_price: Price::from_cents(unit_cents),
            quantity,
        }
    }

    fn request(lines: &[(i32, i32)], include_shipping: bool) -> CreateRefundRequest {
        CreateRefundRequest {
            lines: lines
                .iter()
                .map(|&(id, quantity)| RefundLineRequest {
                    order_item_id: OrderItemId::new(id),
                    quantity,
                })
                .collect(),
            include_shipping,
            reason: RefundReason::CustomerRequest,
            restock: true,
            note: None,
        }
    }

    // Bracelet 2 × 45,00 € + Collier 1 × 89,00 € + port 6,90 € = 185,90 €
    fn fixture() -> (Order, Vec<OrderItem>) {
        (
            order(PaymentStatus::Paid, 18_590, 690),
            vec![item(1, "Bracelet Lune", 4_500, 2), item(2, "Collier Aube", 8_900, 1)],
        )
    }

    #[test]
    fn test_amount_is_sum_of_lines() {
        let (order, items) = fixture();
        let plan = plan_refund(&order, &items, &PriorRefunds::default(), &request(&[(1, 1), (2, 1)], false))
            .unwrap();
        assert_eq!(plan.amount, Price::from_cents(13_400));
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].amount, Price::from_cents(4_500));
        assert!(!plan.includes_shipping);
    }

    #[test]
    fn test_shipping_added_when_requested() {
        let (order, items) = fixture();
        let plan =
            plan_refund(&order, &items, &PriorRefunds::default(), &request(&[(2, 1)], true)).unwrap();
        assert_eq!(plan.amount, Price::from_cents(9_590));

        let shipping_only =
            plan_refund(&order, &items, &PriorRefunds::default(), &request(&[], true)).unwrap();
        assert_eq!(shipping_only.amount, Price::from_cents(690));
        assert!(shipping_only.lines.is_empty());
    }

    #[test]
    fn test_unpaid_order_is_rejected() {
        let (_, items) = fixture();
        for status in [PaymentStatus::Pending, PaymentStatus::Refunded, PaymentStatus::Expired] {
            let order = order(status, 18_590, 690);
            assert_eq!(
                plan_refund(&order, &items, &PriorRefunds::default(), &request(&[(1, 1)], false)),
                Err(BusinessError::OrderNotPaid)
            );
        }
    }

    #[test]
    fn test_empty_refund_is_rejected() {
        let (order, items) = fixture();
        assert_eq!(
            plan_refund(&order, &items, &PriorRefunds::default(), &request(&[], false)),
            Err(BusinessError::EmptyRefund)
        );
    }

    #[test]
    fn test_quantity_beyond_remaining_is_rejected() {
        let (order, items) = fixture();
        let already = [RefundedQuantity {
            order_item_id: OrderItemId::new(1),
            quantity: 1,
        }];
        let prior = PriorRefunds {
            quantities: &already,
            total: Price::from_cents(4_500),
            shipping_refunded: false,
        };

        assert!(plan_refund(&order, &items, &prior, &request(&[(1, 1)], false)).is_ok());
        assert_eq!(
            plan_refund(&order, &items, &prior, &request(&[(1, 2)], false)),
            Err(BusinessError::RefundQuantityExceeded {
                title: "Bracelet Lune".to_string()
            })
        );
    }

    #[test]
    fn test_amount_beyond_remaining_is_rejected() {
        // A 20 € discount makes the paid total lower than the sum of lines
        let (mut order, items) = fixture();
        order.discount_amount = Price::from_cents(2_000);
        order.total = Price::from_cents(16_590);

        let err = plan_refund(
            &order,
            &items,
            &PriorRefunds::default(),
            &request(&[(1, 2), (2, 1)], true),
        )
        .unwrap_err();
        assert_eq!(
            err,
            BusinessError::RefundAmountExceeded {
                remaining: Price::from_cents(16_590)
            }
        );
    }

    #[test]
    fn test_shipping_refunded_once() {
        let (order, items) = fixture();
        let prior = PriorRefunds {
            quantities: &[],
            total: Price::from_cents(690),
            shipping_refunded: true,
        };
        assert!(matches!(
            plan_refund(&order, &items, &prior, &request(&[], true)),
            Err(BusinessError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_duplicate_and_zero_lines_are_rejected() {
        let (order, items) = fixture();
        let prior = PriorRefunds::default();
        assert!(matches!(
            plan_refund(&order, &items, &prior, &request(&[(99, 1)], false)),
            Err(BusinessError::Validation(_))
        ));
        assert!(matches!(
            plan_refund(&order, &items, &prior, &request(&[(1, 1), (1, 1)], false)),
            Err(BusinessError::Validation(_))
        ));
        assert_eq!(
            plan_refund(&order, &items, &prior, &request(&[(2, 0)], false)),
            Err(BusinessError::InvalidQuantity { max: 1 })
        );
    }

    #[test]
    fn test_note_is_trimmed_and_bounded() {
        let mut req = request(&[(1, 1)], false);
        req.note = Some("  colis abîmé  ".to_string());
        assert_eq!(req.note().unwrap(), Some("colis abîmé"));

        req.note = Some("   ".to_string());
        assert_eq!(req.note().unwrap(), None);

        req.note = Some("x".repeat(MAX_NOTE_LENGTH + 1));
        assert!(req.note().is_err());
    }
}
