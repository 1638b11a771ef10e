//! Back-office rules exercised the way the handlers chain them: request
//! bodies parsed from JSON, refunds planned against what earlier refunds
//! already committed.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use synclune_admin::routes::orders::OrdersQuery;
use synclune_admin::services::discounts::{DiscountRequest, validate_discount};
use synclune_admin::services::orders::{
    ShipRequest, check_transition, next_statuses, validate_shipment,
};
use synclune_admin::services::refunds::{
    CreateRefundRequest, PriorRefunds, RefundPlan, payment_status_after_refund, plan_refund,
};
use synclune_core::{
    DiscountKind, FulfillmentStatus, OrderId, OrderItemId, OrderStatus, PaymentStatus, Price,
    SkuId,
};
use synclune_storefront::db::refunds::RefundedQuantity;
use synclune_storefront::error::BusinessError;
use synclune_storefront::models::order::{Order, OrderItem};

fn order(subtotal: i64, discount: i64, shipping: i64) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(501),
        order_number: "SYN-20261018-K7Q2".to_string(),
        user_id: None,
        guest_session_id: None,
        customer_email: "ines@exemple.fr".to_string(),
        customer_name: "Inès Durand".to_string(),
        customer_phone: None,
        shipping_first_name: "Inès".to_string(),
        shipping_last_name: "Durand".to_string(),
        shipping_address1: "3 place Bellecour".to_string(),
        shipping_address2: None,
        shipping_postal_code: "69002".to_string(),
        shipping_city: "Lyon".to_string(),
        shipping_country: "FR".to_string(),
        subtotal: Price::from_cents(subtotal),
        discount_amount: Price::from_cents(discount),
        shipping: Price::from_cents(shipping),
        tax_amount: Price::ZERO,
        total: Price::from_cents(subtotal - discount + shipping),
        currency: "eur".to_string(),
        status: OrderStatus::Processing,
        payment_status: PaymentStatus::Paid,
        fulfillment_status: FulfillmentStatus::Processing,
        stripe_checkout_session_id: Some("cs_test_a1".to_string()),
        stripe_payment_intent_id: Some("pi_3QxY".to_string()),
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
        order_id: OrderId::new(501),
        sku_id: Some(SkuId::new(100 + id)),
        product_id: None,
        product_title: title.to_string(),
        product_slug: title.to_lowercase().replace(' ', "-"),
        sku_code: format!("SYN-{id:03}"),
        sku_color: Some("Or".to_string()),
        sku_material: None,
        sku_size: None,
        image_url: None,
        unit_price: Price::from_cents(unit_cents),
        quantity,
    }
}

fn refund_request(body: serde_json::Value) -> CreateRefundRequest {
    serde_json::from_value(body).expect("valid refund body")
}

/// Quantities a committed plan adds to the prior refunds.
fn committed(prior: &mut Vec<RefundedQuantity>, plan: &RefundPlan) {
    for line in &plan.lines {
        match prior.iter_mut().find(|r| r.order_item_id == line.order_item_id) {
            Some(existing) => existing.quantity += i64::from(line.quantity),
            None => prior.push(RefundedQuantity {
                order_item_id: line.order_item_id,
                quantity: i64::from(line.quantity),
            }),
        }
    }
}

#[test]
fn test_successive_partial_refunds_reach_full_refund() {
    // Boucles 3 × 32,00 € + Bague 1 × 58,00 € + port 4,90 € = 158,90 €
    let order = order(15_400, 0, 490);
    let items = vec![item(1, "Boucles Étoile", 3_200, 3), item(2, "Bague Sélène", 5_800, 1)];

    let mut quantities = Vec::new();
    let mut total = Price::ZERO;
    let mut shipping_refunded = false;

    let bodies = [
        json!({ "lines": [{ "order_item_id": 1, "quantity": 1 }], "reason": "defective", "restock": false }),
        json!({ "lines": [{ "order_item_id": 1, "quantity": 2 }], "include_shipping": true, "reason": "customer_request" }),
        json!({ "lines": [{ "order_item_id": 2, "quantity": 1 }], "reason": "customer_request", "note": "Retour reçu" }),
    ];
    let expected = [3_200, 6_890, 5_800];

    for (body, cents) in bodies.into_iter().zip(expected) {
        let request = refund_request(body);
        let prior = PriorRefunds {
            quantities: &quantities,
            total,
            shipping_refunded,
        };
        let plan = plan_refund(&order, &items, &prior, &request).expect("refundable");
        assert_eq!(plan.amount, Price::from_cents(cents));

        committed(&mut quantities, &plan);
        total = total.saturating_add(plan.amount);
        shipping_refunded |= plan.includes_shipping;

        let status = payment_status_after_refund(order.total, total);
        if total < order.total {
            assert_eq!(status, PaymentStatus::PartiallyRefunded);
        } else {
            assert_eq!(status, PaymentStatus::Refunded);
        }
    }
    assert_eq!(total, order.total);

    // Nothing is left to refund.
    let again = refund_request(json!({ "lines": [{ "order_item_id": 2, "quantity": 1 }], "reason": "other" }));
    let prior = PriorRefunds {
        quantities: &quantities,
        total,
        shipping_refunded,
    };
    assert_eq!(
        plan_refund(&order, &items, &prior, &again),
        Err(BusinessError::RefundQuantityExceeded {
            title: "Bague Sélène (Or)".to_string()
        })
    );
}

#[test]
fn test_discounted_order_caps_refunds_at_amount_paid() {
    // 2 × 45,00 € with 20 % off, free shipping: 72,00 € paid.
    let order = order(9_000, 1_800, 0);
    let items = vec![item(1, "Bracelet Lune", 4_500, 2)];

    let first = refund_request(json!({ "lines": [{ "order_item_id": 1, "quantity": 1 }], "reason": "customer_request" }));
    let plan = plan_refund(&order, &items, &PriorRefunds::default(), &first).expect("refundable");
    assert_eq!(plan.amount, Price::from_cents(4_500));

    let mut quantities = Vec::new();
    committed(&mut quantities, &plan);
    let prior = PriorRefunds {
        quantities: &quantities,
        total: plan.amount,
        shipping_refunded: false,
    };

    // The second unit at list price would exceed what remains of the payment.
    assert_eq!(
        plan_refund(&order, &items, &prior, &first),
        Err(BusinessError::RefundAmountExceeded {
            remaining: Price::from_cents(2_700)
        })
    );
}

#[test]
fn test_unpaid_order_cannot_be_refunded() {
    let mut order = order(4_500, 0, 490);
    order.payment_status = PaymentStatus::Pending;
    let items = vec![item(1, "Bracelet Lune", 4_500, 1)];
    let request = refund_request(json!({ "lines": [], "include_shipping": true, "reason": "other" }));

    assert_eq!(
        plan_refund(&order, &items, &PriorRefunds::default(), &request),
        Err(BusinessError::OrderNotPaid)
    );
}

#[test]
fn test_fulfillment_path() {
    let next = next_statuses(OrderStatus::Processing);
    assert!(next.contains(&OrderStatus::Shipped));
    assert!(!next.contains(&OrderStatus::Delivered));
    assert!(check_transition(OrderStatus::Processing, OrderStatus::Shipped).is_ok());
    assert!(check_transition(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
    assert!(check_transition(OrderStatus::Delivered, OrderStatus::Shipped).is_err());
    assert!(check_transition(OrderStatus::Pending, OrderStatus::Delivered).is_err());

    let ship: ShipRequest = serde_json::from_value(json!({
        "carrier": " Colissimo ",
        "tracking_number": "6A12345678901",
        "tracking_url": "https://www.laposte.fr/outils/suivre-vos-envois?code=6A12345678901"
    }))
    .expect("valid ship body");
    assert!(validate_shipment(&ship).is_ok());

    let missing: ShipRequest =
        serde_json::from_value(json!({ "carrier": "Colissimo", "tracking_number": "  " }))
            .expect("valid ship body");
    assert!(validate_shipment(&missing).is_err());
}

#[test]
fn test_discount_body_validation() {
    let now = Utc
        .with_ymd_and_hms(2026, 11, 20, 8, 0, 0)
        .single()
        .expect("valid date");
    let body = json!({
        "code": "black-friday",
        "discount_type": "percentage",
        "value": 30,
        "max_usage_per_user": 1,
        "ends_at": (now + Duration::days(4)).to_rfc3339(),
    });
    let request: DiscountRequest = serde_json::from_value(body).expect("valid discount body");
    let input = validate_discount(&request, now).expect("valid discount");
    assert_eq!(input.code, "BLACK-FRIDAY");
    assert_eq!(input.kind, DiscountKind::Percentage(30));
    assert_eq!(input.starts_at, now);
    assert!(input.is_active);

    let expired: DiscountRequest = serde_json::from_value(json!({
        "code": "TROPTARD",
        "discount_type": "fixed_amount",
        "value": 500,
        "starts_at": now.to_rfc3339(),
        "ends_at": (now - Duration::days(1)).to_rfc3339(),
    }))
    .expect("valid discount body");
    assert!(validate_discount(&expired, now).is_err());
}

#[test]
fn test_order_listing_query() {
    let query: OrdersQuery = serde_json::from_value(json!({
        "status": "processing",
        "q": "  durand ",
        "page": 2,
        "per_page": 50
    }))
    .expect("valid query");
    let filters = query.into_filters().expect("valid filters");
    assert_eq!(filters.status, Some(OrderStatus::Processing));
    assert_eq!(filters.search.as_deref(), Some("durand"));
    assert_eq!(filters.offset(), 50);
}
