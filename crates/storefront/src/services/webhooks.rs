//! Stripe webhook handling.
//!
//! Every event is recorded in `webhook_event` before it is handled. An event
//! already `processed` or `skipped` is acknowledged without running again;
//! a `failed` one is retried when Stripe redelivers it.

use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use synclune_core::{OrderId, PaymentStatus, WebhookEventStatus};

use crate::db::{OrderRepository, WebhookEventRepository, carts, orders};
use crate::error::AppError;
use crate::services::email::EmailService;
use crate::services::stripe::{CheckoutSession, Event, StripeClient, StripeError};

/// What an event type asks the shop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The checkout session finished; paid unless the method is asynchronous.
    SessionCompleted,
    /// The session can no longer be paid; the order is cancelled with this
    /// payment status.
    SessionClosed(PaymentStatus),
    /// Money went back to the customer.
    ChargeRefunded,
    Unhandled,
}

impl EventKind {
    #[must_use]
    pub fn of(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                Self::SessionCompleted
            }
            "checkout.session.expired" => Self::SessionClosed(PaymentStatus::Expired),
            "checkout.session.async_payment_failed" => Self::SessionClosed(PaymentStatus::Failed),
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unhandled,
        }
    }
}

/// Result of receiving one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Processed,
    Skipped,
    /// Already settled by an earlier delivery.
    Duplicate,
}

/// A paid session whose order was not pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatePayment {
    /// An earlier delivery already settled it.
    AlreadyPaid,
    /// The order was cancelled or expired before the payment landed.
    OrderClosed,
    /// No order has this id.
    OrderMissing,
}

impl LatePayment {
    #[must_use]
    pub const fn of(payment_status: Option<PaymentStatus>) -> Self {
        match payment_status {
            Some(status) if status.is_paid() => Self::AlreadyPaid,
            Some(_) => Self::OrderClosed,
            None => Self::OrderMissing,
        }
    }
}

/// Webhook event processor.
pub struct WebhookService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    email: &'a EmailService,
}

impl<'a> WebhookService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, email: &'a EmailService) -> Self {
        Self { pool, stripe, email }
    }

    /// Record and handle a verified event.
    ///
    /// # Errors
    ///
    /// Returns the handler's error after storing it on the event as `failed`.
    #[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn receive(&self, event: &Event) -> Result<Delivery, AppError> {
        let events = WebhookEventRepository::new(self.pool);
        let Some(record) = events.begin(&event.id, &event.event_type).await? else {
            info!("Event already settled");
            return Ok(Delivery::Duplicate);
        };

        match self.dispatch(event).await {
            Ok(delivery) => {
                let status = match delivery {
                    Delivery::Skipped => WebhookEventStatus::Skipped,
                    Delivery::Processed | Delivery::Duplicate => WebhookEventStatus::Processed,
                };
                events.finish(record.id, status, None).await?;
                info!(attempts = record.attempts, ?status, "Event handled");
                Ok(delivery)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(store_err) = events
                    .finish(record.id, WebhookEventStatus::Failed, Some(&message))
                    .await
                {
                    warn!(error = %store_err, "Could not record event failure");
                }
                Err(e)
            }
        }
    }

    async fn dispatch(&self, event: &Event) -> Result<Delivery, AppError> {
        match EventKind::of(&event.event_type) {
            EventKind::SessionCompleted => {
                let session = event.checkout_session()?;
                if !session.is_paid() {
                    info!(session_id = %session.id, "Session completed without payment yet");
                    return Ok(Delivery::Skipped);
                }
                let order_id = session_order_id(&session)?;
                self.mark_paid(order_id, session.payment_intent.as_deref())
                    .await?;
                Ok(Delivery::Processed)
            }
            EventKind::SessionClosed(status) => {
                let session = event.checkout_session()?;
                let order_id = session_order_id(&session)?;
                self.cancel_unpaid(order_id, status).await?;
                Ok(Delivery::Processed)
            }
            EventKind::ChargeRefunded => {
                let charge = event.charge()?;
                let Some(payment_intent) = charge.payment_intent.as_deref() else {
                    warn!(charge_id = %charge.id, "Refunded charge without payment intent");
                    return Ok(Delivery::Skipped);
                };
                let status = if charge.is_fully_refunded() {
                    PaymentStatus::Refunded
                } else {
                    PaymentStatus::PartiallyRefunded
                };
                match OrderRepository::new(self.pool)
                    .set_refund_status(payment_intent, status)
                    .await?
                {
                    Some(order) => info!(order_id = %order.id, ?status, "Refund recorded"),
                    None => warn!(payment_intent, "No paid order for refunded charge"),
                }
                Ok(Delivery::Processed)
            }
            EventKind::Unhandled => Ok(Delivery::Skipped),
        }
    }

    /// Paid orders are never updated twice.
    #[instrument(skip(self))]
    async fn mark_paid(&self, order_id: OrderId, payment_intent: Option<&str>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::mark_paid(&mut tx, order_id, payment_intent).await? else {
            let current = orders::lock(&mut tx, order_id).await?;
            tx.rollback().await?;
            match LatePayment::of(current.as_ref().map(|o| o.payment_status)) {
                LatePayment::AlreadyPaid => info!("Order already paid, nothing to do"),
                late => {
                    // Money was taken for an order that no longer expects it.
                    error!(
                        ?late,
                        payment_intent,
                        "Payment received for an order not awaiting payment"
                    );
                    sentry::capture_message(
                        &format!(
                            "Payment received for order {order_id} that is not awaiting payment \
                             ({late:?}); refund it manually"
                        ),
                        sentry::Level::Error,
                    );
                }
            }
            return Ok(());
        };
        let cleared =
            carts::clear_for_buyer(&mut tx, order.user_id, order.guest_session_id.as_deref()).await?;
        tx.commit().await?;

        info!(order_number = %order.order_number, cart_lines_cleared = cleared, "Order paid");

        match OrderRepository::new(self.pool).items(order.id).await {
            Ok(items) => {
                if let Err(e) = self.email.send_order_confirmation(&order, &items).await {
                    warn!(error = %e, "Order confirmation email failed");
                }
            }
            Err(e) => warn!(error = %e, "Could not load items for confirmation email"),
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_unpaid(&self, order_id: OrderId, status: PaymentStatus) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::cancel_unpaid(&mut tx, order_id, status).await? else {
            tx.rollback().await?;
            info!("Order no longer pending payment, nothing to release");
            return Ok(());
        };
        let released = orders::release_reservations(&mut tx, order.id).await?;
        tx.commit().await?;

        info!(
            units_restocked = released.units_restocked,
            discount_released = released.discount_released,
            "Unpaid order cancelled"
        );

        if let Some(coupon_id) = order.stripe_coupon_id.as_deref()
            && let Err(e) = self.stripe.delete_coupon(coupon_id).await
        {
            warn!(error = %e, coupon_id, "Could not delete coupon of cancelled order");
        }
        Ok(())
    }
}

fn session_order_id(session: &CheckoutSession) -> Result<OrderId, StripeError> {
    session.order_id().ok_or_else(|| {
        StripeError::InvalidEvent(format!("session {} carries no order id", session.id))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert_eq!(
            EventKind::of("checkout.session.completed"),
            EventKind::SessionCompleted
        );
        assert_eq!(
            EventKind::of("checkout.session.async_payment_succeeded"),
            EventKind::SessionCompleted
        );
        assert_eq!(
            EventKind::of("checkout.session.expired"),
            EventKind::SessionClosed(PaymentStatus::Expired)
        );
        assert_eq!(
            EventKind::of("checkout.session.async_payment_failed"),
            EventKind::SessionClosed(PaymentStatus::Failed)
        );
        assert_eq!(EventKind::of("charge.refunded"), EventKind::ChargeRefunded);
        assert_eq!(EventKind::of("customer.created"), EventKind::Unhandled);
    }

    #[test]
    fn test_late_payment_classification() {
        assert_eq!(LatePayment::of(Some(PaymentStatus::Paid)), LatePayment::AlreadyPaid);
        assert_eq!(
            LatePayment::of(Some(PaymentStatus::PartiallyRefunded)),
            LatePayment::AlreadyPaid
        );
        assert_eq!(LatePayment::of(Some(PaymentStatus::Expired)), LatePayment::OrderClosed);
        assert_eq!(LatePayment::of(Some(PaymentStatus::Failed)), LatePayment::OrderClosed);
        assert_eq!(LatePayment::of(None), LatePayment::OrderMissing);
    }

    #[test]
    fn test_session_without_order_id_is_invalid() {
        let event = Event::parse(
            br#"{"id":"evt_1","type":"checkout.session.expired","data":{"object":{"id":"cs_1"}}}"#,
        )
        .unwrap();
        let session = event.checkout_session().unwrap();
        assert!(matches!(
            session_order_id(&session),
            Err(StripeError::InvalidEvent(_))
        ));
    }
}
