//! Payment session creation and compensation of a failed checkout.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use synclune_core::{OrderId, Price};

use super::writer::WrittenOrder;
use crate::db::{OrderRepository, orders};
use crate::error::AppError;
use crate::services::stripe::{CheckoutSession, CheckoutSessionRequest, LineItem, StripeClient};

/// Lifetime of an embedded checkout session.
pub const SESSION_TTL_MINUTES: i64 = 30;

/// Provider ids stored on the order once the session exists.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub client_secret: String,
    pub session_id: String,
    pub coupon_id: Option<String>,
}

/// Session request for a written order. Shipping is billed as its own line.
#[must_use]
pub fn session_request(
    written: &WrittenOrder,
    coupon_id: Option<String>,
    return_url: &str,
    now: DateTime<Utc>,
) -> CheckoutSessionRequest {
    let mut line_items: Vec<LineItem> = written.lines.iter().map(|l| l.to_line_item()).collect();
    if written.totals.shipping > Price::ZERO {
        line_items.push(LineItem {
            name: "Livraison".to_string(),
            unit_amount: written.totals.shipping,
            quantity: 1,
            image_url: None,
        });
    }

    CheckoutSessionRequest {
        order_id: written.order.id,
        order_number: written.order.order_number.clone(),
        customer_email: written.order.customer_email.clone(),
        line_items,
        coupon_id,
        return_url: return_url.to_string(),
        expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
    }
}

/// Create the checkout session for an order and store its ids.
///
/// A session that cannot be stored is expired again.
///
/// # Errors
///
/// Returns the first provider or database error.
#[instrument(skip_all, fields(order_id = %written.order.id))]
pub async fn open_session(
    pool: &PgPool,
    stripe: &StripeClient,
    written: &WrittenOrder,
    coupon_id: Option<&str>,
    return_url: &str,
) -> Result<PaymentSession, AppError> {
    let request = session_request(written, coupon_id.map(String::from), return_url, Utc::now());
    let session: CheckoutSession = stripe.create_checkout_session(&request).await?;
    let client_secret = session.client_secret.clone().ok_or_else(|| {
        AppError::Internal("checkout session returned without client secret".to_string())
    })?;

    let stored = OrderRepository::new(pool)
        .set_payment_session(written.order.id, &session.id, coupon_id)
        .await;
    if let Err(e) = stored {
        if let Err(expire_err) = stripe.expire_checkout_session(&session.id).await {
            warn!(error = %expire_err, session_id = %session.id, "Could not expire orphan session");
        }
        return Err(e.into());
    }

    info!(session_id = %session.id, "Checkout session created");
    Ok(PaymentSession {
        client_secret,
        session_id: session.id,
        coupon_id: coupon_id.map(String::from),
    })
}

/// Undo a committed order whose payment session could not be created.
///
/// Deletes the order and gives back its stock and discount slot in one
/// transaction, then deletes the provider coupon. Each step is best effort.
#[instrument(skip(pool, stripe))]
pub async fn compensate(
    pool: &PgPool,
    stripe: &StripeClient,
    order_id: OrderId,
    coupon_id: Option<&str>,
) {
    match rollback_order(pool, order_id).await {
        Ok(()) => info!("Failed checkout rolled back"),
        Err(e) => error!(error = %e, "Could not roll back failed checkout"),
    }

    if let Some(coupon_id) = coupon_id
        && let Err(e) = stripe.delete_coupon(coupon_id).await
    {
        error!(error = %e, coupon_id, "Could not delete coupon of failed checkout");
    }
}

async fn rollback_order(pool: &PgPool, order_id: OrderId) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    if orders::lock(&mut tx, order_id).await?.is_none() {
        return Ok(());
    }
    let released = orders::release_reservations(&mut tx, order_id).await?;
    orders::delete(&mut tx, order_id).await?;
    tx.commit().await?;

    info!(
        units_restocked = released.units_restocked,
        discount_released = released.discount_released,
        "Reservations released"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use synclune_core::{
        FulfillmentStatus, OrderStatus, PaymentStatus, ProductId, ProductStatus, SkuId,
    };

    use super::*;
    use crate::models::order::Order;
    use crate::models::product::SkuSnapshot;
    use crate::services::checkout::pricing::{ShippingZone, Totals};
    use crate::services::checkout::verify::VerifiedLine;
    use crate::services::checkout::writer::AppliedDiscount;

    fn order(id: i32) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(id),
            order_number: "SYN-20260101-ABCDEF".to_string(),
            user_id: None,
            guest_session_id: None,
            customer_email: "lea@example.fr".to_string(),
            customer_name: "Léa Martin".to_string(),
            customer_phone: None,
            shipping_first_name: "Léa".to_string(),
            shipping_last_name: "Martin".to_string(),
            shipping_address1: "1 rue".to_string(),
            shipping_address2: None,
            shipping_postal_code: "69001".to_string(),
            shipping_city: "Lyon".to_string(),
            shipping_country: "FR".to_string(),
            subtotal: Price::from_cents(4_000),
            discount_amount: Price::ZERO,
            shipping: Price::from_cents(600),
            tax_amount: Price::from_cents(767),
            total: Price::from_cents(4_600),
            currency: "eur".to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: None,
            stripe_coupon_id: None,
            carrier: None,
            tracking_number: None,
            tracking_url: None,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn written(shipping: i64) -> WrittenOrder {
        let sku = SkuSnapshot {
            sku_id: SkuId::new(3),
            product_id: ProductId::new(1),
            product_title: "Bracelet Onde".to_string(),
            product_slug: "bracelet-onde".to_string(),
            product_status: ProductStatus::Public,
            sku_code: "BO-1".to_string(),
            color: None,
            material: Some("Argent".to_string()),
            size: None,
            price: Price::from_cents(2_000),
            inventory: 4,
            is_active: true,
            image_url: Some("https://cdn.synclune.fr/bo.jpg".to_string()),
        };
        let mut totals = Totals::compute(Price::from_cents(4_000), Price::ZERO, ShippingZone::Domestic);
        totals.shipping = Price::from_cents(shipping);
        WrittenOrder {
            order: order(42),
            items: vec![],
            lines: vec![VerifiedLine { sku, quantity: 2 }],
            discount: Some(AppliedDiscount {
                code: "BIJOUX10".to_string(),
                amount: Price::from_cents(400),
            }),
            totals,
        }
    }

    #[test]
    fn test_session_request_bills_shipping_as_line() {
        let now = Utc::now();
        let request = session_request(&written(600), Some("co_1".to_string()), "https://x/r", now);
        assert_eq!(request.order_id, OrderId::new(42));
        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.line_items[0].name, "Bracelet Onde (Argent)");
        assert_eq!(request.line_items[1].name, "Livraison");
        assert_eq!(request.line_items[1].unit_amount, Price::from_cents(600));
        assert_eq!(request.coupon_id.as_deref(), Some("co_1"));
        assert_eq!(request.expires_at - now, Duration::minutes(30));
    }

    #[test]
    fn test_free_shipping_has_no_line() {
        let request = session_request(&written(0), None, "https://x/r", Utc::now());
        assert_eq!(request.line_items.len(), 1);
    }
}
