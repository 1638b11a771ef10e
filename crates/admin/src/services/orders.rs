//! Order detail and status transitions.
//!
//! Every transition goes through [`OrderStatus::can_transition_to`] on the
//! locked row. Paid orders cannot be cancelled here; money goes back through
//! a refund.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use synclune_core::{OrderId, OrderStatus, PaymentStatus, Price};
use synclune_storefront::db::{
    DiscountRepository, OrderRepository, RefundRepository, orders, refunds,
};
use synclune_storefront::error::{AppError, BusinessError, Result};
use synclune_storefront::models::discount::DiscountUsage;
use synclune_storefront::models::order::{Order, OrderWithItems};
use synclune_storefront::models::refund::Refund;
use synclune_storefront::services::email::EmailService;
use synclune_storefront::services::stripe::{SessionClosure, StripeClient};

use crate::db::orders::{self as admin_orders, Shipment};

const ALL_STATUSES: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

const MAX_CARRIER_LENGTH: usize = 60;
const MAX_TRACKING_LENGTH: usize = 120;

/// Body of `POST /orders/{id}/ship`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipRequest {
    pub carrier: String,
    pub tracking_number: String,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

/// Everything the order screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderWithItems,
    pub refunds: Vec<Refund>,
    pub discount_usage: Option<DiscountUsage>,
    /// Amount not yet covered by pending or completed refunds.
    pub refundable_amount: Price,
    /// Statuses the order may move to next.
    pub next_statuses: Vec<OrderStatus>,
}

/// Reject a move the order lifecycle does not allow.
///
/// # Errors
///
/// Returns `BusinessError::InvalidStatusTransition`.
pub const fn check_transition(
    from: OrderStatus,
    to: OrderStatus,
) -> std::result::Result<(), BusinessError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(BusinessError::InvalidStatusTransition { from, to })
    }
}

/// Only unpaid orders are cancelled here; paid ones go through a refund.
///
/// # Errors
///
/// Returns `BusinessError::OrderAlreadyPaid` for a paid order, or
/// `BusinessError::InvalidStatusTransition` when the status forbids it.
pub const fn check_cancellable(
    status: OrderStatus,
    payment_status: PaymentStatus,
) -> std::result::Result<(), BusinessError> {
    if payment_status.is_paid() {
        return Err(BusinessError::OrderAlreadyPaid);
    }
    check_transition(status, OrderStatus::Cancelled)
}

/// Statuses reachable from `from`.
#[must_use]
pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
    ALL_STATUSES
        .into_iter()
        .filter(|to| from.can_transition_to(*to))
        .collect()
}

fn trimmed<'a>(
    value: &'a str,
    field: &'static str,
    max: usize,
) -> std::result::Result<&'a str, BusinessError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BusinessError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(BusinessError::Validation(format!(
            "Le champ « {field} » ne peut pas dépasser {max} caractères."
        )));
    }
    Ok(value)
}

/// Validate the tracking details of a shipment.
///
/// # Errors
///
/// Returns a `BusinessError` for a blank or oversized field, or a tracking
/// URL that is not `http(s)`.
pub fn validate_shipment(
    request: &ShipRequest,
) -> std::result::Result<Shipment<'_>, BusinessError> {
    let carrier = trimmed(&request.carrier, "transporteur", MAX_CARRIER_LENGTH)?;
    let tracking_number = trimmed(&request.tracking_number, "numéro de suivi", MAX_TRACKING_LENGTH)?;
    let tracking_url = request
        .tracking_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());

    if let Some(url) = tracking_url
        && !(url.starts_with("https://") || url.starts_with("http://"))
    {
        return Err(BusinessError::Validation(
            "Le lien de suivi doit commencer par http:// ou https://.".to_string(),
        ));
    }

    Ok(Shipment {
        carrier,
        tracking_number,
        tracking_url,
    })
}

/// Order operations of the back-office.
pub struct OrderAdminService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    email: &'a EmailService,
}

impl<'a> OrderAdminService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, email: &'a EmailService) -> Self {
        Self {
            pool,
            stripe,
            email,
        }
    }

    /// Order with lines, refunds and discount usage.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order.
    pub async fn detail(&self, id: OrderId) -> Result<OrderDetail> {
        let order = OrderRepository::new(self.pool)
            .get_with_items(id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        let refunds = RefundRepository::new(self.pool).list_for_order(id).await?;
        let discount_usage = DiscountRepository::new(self.pool).usage_for_order(id).await?;

        let mut conn = self.pool.acquire().await?;
        let committed = refunds::committed_total(&mut conn, id).await?;
        let refundable_amount = if order.order.payment_status.is_refundable() {
            order.order.total.saturating_sub(committed)
        } else {
            Price::ZERO
        };
        let next_statuses = next_statuses(order.order.status);

        Ok(OrderDetail {
            order,
            refunds,
            discount_usage,
            refundable_amount,
            next_statuses,
        })
    }

    /// Hand a processing order to the carrier and notify the customer.
    ///
    /// # Errors
    ///
    /// Returns a `BusinessError` for invalid tracking details or a status
    /// that cannot ship.
    #[instrument(skip(self, request), fields(order_id = %id))]
    pub async fn ship(&self, id: OrderId, request: &ShipRequest) -> Result<Order> {
        let shipment = validate_shipment(request)?;

        let mut tx = self.pool.begin().await?;
        let current = orders::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        check_transition(current.status, OrderStatus::Shipped)?;

        let order = admin_orders::mark_shipped(&mut tx, id, &shipment)
            .await?
            .ok_or(BusinessError::Conflict)?;
        tx.commit().await?;

        info!(carrier = shipment.carrier, "Order shipped");
        if let Err(e) = self.email.send_order_shipped(&order).await {
            warn!(error = %e, "Could not send shipping notice");
        }
        Ok(order)
    }

    /// Record delivery of a shipped order.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::InvalidStatusTransition` unless the order shipped.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn deliver(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let current = orders::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        check_transition(current.status, OrderStatus::Delivered)?;

        let order = admin_orders::mark_delivered(&mut tx, id)
            .await?
            .ok_or(BusinessError::Conflict)?;
        tx.commit().await?;

        info!("Order delivered");
        Ok(order)
    }

    /// Cancel an order that was never paid and give back its stock and
    /// discount slot.
    ///
    /// The payment session is closed at Stripe before anything is written,
    /// so the buyer cannot pay an order that is being cancelled. If Stripe
    /// reports the session as already paid, the cancel is refused and the
    /// payment webhook settles the order.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::OrderAlreadyPaid` for a paid order, or the
    /// Stripe error when the session could not be closed; nothing is
    /// changed in either case.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel(&self, id: OrderId) -> Result<Order> {
        let current = OrderRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        check_cancellable(current.status, current.payment_status)?;

        if let Some(session_id) = current.stripe_checkout_session_id.as_deref() {
            match self.stripe.close_checkout_session(session_id).await? {
                SessionClosure::Expired => {}
                SessionClosure::AlreadyComplete => {
                    warn!(session_id, "Checkout session already paid, cancel refused");
                    return Err(BusinessError::OrderAlreadyPaid.into());
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        let locked = orders::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        if locked.status == OrderStatus::Cancelled && !locked.payment_status.is_paid() {
            // The session expiry webhook got there first.
            tx.rollback().await?;
            info!("Order already cancelled");
            return Ok(locked);
        }
        check_cancellable(locked.status, locked.payment_status)?;

        let order = orders::cancel_unpaid(&mut tx, id, PaymentStatus::Expired)
            .await?
            .ok_or(BusinessError::Conflict)?;
        let released = orders::release_reservations(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            units_restocked = released.units_restocked,
            discount_released = released.discount_released,
            "Order cancelled"
        );

        if let Some(coupon_id) = order.stripe_coupon_id.as_deref()
            && let Err(e) = self.stripe.delete_coupon(coupon_id).await
        {
            warn!(error = %e, "Could not delete coupon");
        }
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(carrier: &str, tracking: &str, url: Option<&str>) -> ShipRequest {
        ShipRequest {
            carrier: carrier.to_string(),
            tracking_number: tracking.to_string(),
            tracking_url: url.map(String::from),
        }
    }

    #[test]
    fn test_check_transition() {
        assert!(check_transition(OrderStatus::Processing, OrderStatus::Shipped).is_ok());
        assert!(check_transition(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
        assert_eq!(
            check_transition(OrderStatus::Pending, OrderStatus::Shipped),
            Err(BusinessError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        );
        assert!(check_transition(OrderStatus::Delivered, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_check_cancellable() {
        assert!(check_cancellable(OrderStatus::Pending, PaymentStatus::Pending).is_ok());
        assert!(check_cancellable(OrderStatus::Pending, PaymentStatus::Failed).is_ok());
        assert_eq!(
            check_cancellable(OrderStatus::Processing, PaymentStatus::Paid),
            Err(BusinessError::OrderAlreadyPaid)
        );
        assert_eq!(
            check_cancellable(OrderStatus::Shipped, PaymentStatus::PartiallyRefunded),
            Err(BusinessError::OrderAlreadyPaid)
        );
        assert!(matches!(
            check_cancellable(OrderStatus::Delivered, PaymentStatus::Pending),
            Err(BusinessError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_next_statuses() {
        assert_eq!(
            next_statuses(OrderStatus::Processing),
            vec![OrderStatus::Shipped, OrderStatus::Cancelled]
        );
        assert!(next_statuses(OrderStatus::Delivered).is_empty());
        assert!(next_statuses(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_validate_shipment_trims() {
        let req = request("  Colissimo ", " 6A12345678901 ", Some("  "));
        let shipment = validate_shipment(&req).unwrap();
        assert_eq!(shipment.carrier, "Colissimo");
        assert_eq!(shipment.tracking_number, "6A12345678901");
        assert_eq!(shipment.tracking_url, None);
    }

    #[test]
    fn test_validate_shipment_rejects_blank_fields() {
        assert_eq!(
            validate_shipment(&request(" ", "6A1", None)).unwrap_err(),
            BusinessError::MissingField("transporteur")
        );
        assert_eq!(
            validate_shipment(&request("Colissimo", "", None)).unwrap_err(),
            BusinessError::MissingField("numéro de suivi")
        );
    }

    #[test]
    fn test_validate_shipment_tracking_url_scheme() {
        let ok = request("Colissimo", "6A1", Some("https://www.laposte.fr/outils/suivre-vos-envois?code=6A1"));
        assert!(validate_shipment(&ok).is_ok());

        let bad = request("Colissimo", "6A1", Some("javascript:alert(1)"));
        assert!(matches!(
            validate_shipment(&bad).unwrap_err(),
            BusinessError::Validation(_)
        ));
    }
}
