//! Back-office refunds.
//!
//! A refund is created `pending` (its amount already counts against the
//! order), then processed: the provider refund is requested with the
//! idempotency key `refund-{id}` and the refund becomes `completed` or
//! `failed`. A network failure leaves it pending so processing can be
//! retried safely. A refund the provider accepted but has not settled
//! keeps its provider id and stays pending; processing it again polls
//! the provider instead of creating a second refund.

mod plan;

pub use plan::{
    CreateRefundRequest, MAX_NOTE_LENGTH, PlannedLine, PriorRefunds, RefundLineRequest,
    RefundPlan, plan_refund,
};

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use synclune_core::{OrderId, OrderItemId, PaymentStatus, Price, RefundId, RefundStatus, UserId};
use synclune_storefront::db::{OrderRepository, RefundRepository, orders, products, refunds};
use synclune_storefront::error::{AppError, BusinessError, Result};
use synclune_storefront::models::order::{Order, OrderItem};
use synclune_storefront::models::refund::{Refund, RefundItem};
use synclune_storefront::services::email::EmailService;
use synclune_storefront::services::stripe::{StripeClient, StripeError};

use crate::db::refunds::shipping_refunded;

/// A refund with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct RefundWithItems {
    #[serde(flatten)]
    pub refund: Refund,
    pub items: Vec<RefundItem>,
}

/// Payment status once `completed` refunds total `refunded` out of `total`.
#[must_use]
pub fn payment_status_after_refund(total: Price, refunded: Price) -> PaymentStatus {
    if refunded >= total {
        PaymentStatus::Refunded
    } else {
        PaymentStatus::PartiallyRefunded
    }
}

/// Where the provider stands on a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    Succeeded,
    /// `pending`, `requires_action` or not reported yet.
    InProgress,
    Rejected,
}

impl ProviderOutcome {
    #[must_use]
    pub fn of(status: Option<&str>) -> Self {
        match status {
            Some("succeeded") => Self::Succeeded,
            Some("failed" | "canceled") => Self::Rejected,
            _ => Self::InProgress,
        }
    }
}

/// Refund operations of the back-office.
pub struct RefundService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    email: &'a EmailService,
}

impl<'a> RefundService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, email: &'a EmailService) -> Self {
        Self {
            pool,
            stripe,
            email,
        }
    }

    /// Record a pending refund after checking it against the order and the
    /// refunds already committed.
    ///
    /// # Errors
    ///
    /// Returns a `BusinessError` when the refund breaks a rule of
    /// [`plan_refund`], or `AppError::NotFound` for an unknown order.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn create(
        &self,
        order_id: OrderId,
        request: &CreateRefundRequest,
        created_by: UserId,
    ) -> Result<RefundWithItems> {
        let note = request.note()?;

        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        let items = orders::items_in(&mut tx, order_id).await?;
        let quantities = refunds::refunded_quantities(&mut tx, order_id).await?;
        let prior = PriorRefunds {
            quantities: &quantities,
            total: refunds::committed_total(&mut tx, order_id).await?,
            shipping_refunded: shipping_refunded(&mut tx, order_id).await?,
        };

        let plan = plan_refund(&order, &items, &prior, request)?;

        let refund = refunds::insert(
            &mut tx,
            &refunds::NewRefund {
                order_id,
                amount: plan.amount,
                includes_shipping: plan.includes_shipping,
                reason: request.reason,
                restock: request.restock,
                note,
                created_by: Some(created_by),
            },
        )
        .await?;

        let mut refund_items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            refund_items.push(
                refunds::insert_item(&mut tx, refund.id, line.order_item_id, line.quantity, line.amount)
                    .await?,
            );
        }
        tx.commit().await?;

        info!(refund_id = %refund.id, amount = %refund.amount, "Refund created");
        Ok(RefundWithItems {
            refund,
            items: refund_items,
        })
    }

    /// Send a pending refund to the provider and settle it.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::RefundNotPending` if the refund was already
    /// settled, or `AppError::Stripe` when the provider call fails.
    #[instrument(skip(self), fields(refund_id = %id))]
    pub async fn process(&self, id: RefundId) -> Result<Refund> {
        let repo = RefundRepository::new(self.pool);
        let refund = repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("remboursement".to_string()))?;
        if refund.status != RefundStatus::Pending {
            return Err(BusinessError::RefundNotPending.into());
        }

        let order = OrderRepository::new(self.pool)
            .get(refund.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        let payment_intent_id = order
            .stripe_payment_intent_id
            .as_deref()
            .ok_or(BusinessError::OrderNotPaid)?;

        let request = match refund.stripe_refund_id.as_deref() {
            Some(stripe_refund_id) => self.stripe.retrieve_refund(stripe_refund_id).await,
            None => {
                self.stripe
                    .create_refund(payment_intent_id, refund.amount, refund.reason, refund.id)
                    .await
            }
        };
        let provider_refund = match request {
            Ok(provider_refund) => provider_refund,
            Err(e @ StripeError::Request(_)) => {
                warn!(error = %e, "Refund request did not reach the provider; left pending");
                return Err(e.into());
            }
            Err(e) => {
                repo.mark_failed(id, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        match ProviderOutcome::of(provider_refund.status.as_deref()) {
            ProviderOutcome::Succeeded => {}
            ProviderOutcome::Rejected => {
                let reason = format!(
                    "provider status {}",
                    provider_refund.status.as_deref().unwrap_or("unknown")
                );
                warn!(stripe_refund_id = %provider_refund.id, %reason, "Refund rejected by provider");
                return Ok(repo.mark_failed(id, &reason).await?);
            }
            ProviderOutcome::InProgress => {
                info!(
                    stripe_refund_id = %provider_refund.id,
                    status = provider_refund.status.as_deref().unwrap_or("unknown"),
                    "Refund not settled by provider yet; left pending"
                );
                return Ok(repo.record_provider_id(id, &provider_refund.id).await?);
            }
        }

        let (refund, order) = self.settle(id, &provider_refund.id).await?;

        if let Some(order) = order
            && let Err(e) = self.email.send_refund_processed(&order, refund.amount).await
        {
            warn!(error = %e, "Could not send refund notice");
        }
        Ok(refund)
    }

    /// Mark the refund completed, restock and update the order's payment
    /// status in one transaction.
    async fn settle(
        &self,
        id: RefundId,
        stripe_refund_id: &str,
    ) -> Result<(Refund, Option<Order>)> {
        let mut tx = self.pool.begin().await?;
        let locked = refunds::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("remboursement".to_string()))?;
        if locked.status == RefundStatus::Completed {
            // Settled by a concurrent call with the same idempotency key.
            return Ok((locked, None));
        }

        let refund = refunds::mark_completed(&mut tx, id, stripe_refund_id).await?;

        if refund.restock {
            let order_items: HashMap<OrderItemId, OrderItem> = orders::items_in(&mut tx, refund.order_id)
                .await?
                .into_iter()
                .map(|item| (item.id, item))
                .collect();
            for line in refunds::items_in(&mut tx, id).await? {
                if let Some(sku_id) = order_items.get(&line.order_item_id).and_then(|i| i.sku_id) {
                    products::restore_inventory(&mut tx, sku_id, line.quantity).await?;
                }
            }
        }

        let order = orders::lock(&mut tx, refund.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("commande".to_string()))?;
        let refunded = refunds::completed_total(&mut tx, order.id).await?;
        let order = crate::db::orders::set_payment_status(
            &mut tx,
            order.id,
            payment_status_after_refund(order.total, refunded),
        )
        .await?;
        tx.commit().await?;

        info!(
            stripe_refund_id,
            payment_status = %order.payment_status,
            "Refund completed"
        );
        Ok((refund, Some(order)))
    }

    /// Cancel a refund that was never sent to the provider.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::RefundNotPending` if it is no longer pending.
    #[instrument(skip(self), fields(refund_id = %id))]
    pub async fn cancel(&self, id: RefundId) -> Result<Refund> {
        let refund = RefundRepository::new(self.pool)
            .cancel_pending(id)
            .await?
            .ok_or(BusinessError::RefundNotPending)?;
        info!("Refund cancelled");
        Ok(refund)
    }

    /// A refund with its lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown refund.
    pub async fn get(&self, id: RefundId) -> Result<RefundWithItems> {
        let repo = RefundRepository::new(self.pool);
        let refund = repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("remboursement".to_string()))?;
        let items = repo.items(id).await?;
        Ok(RefundWithItems { refund, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_after_refund() {
        let total = Price::from_cents(18_590);
        assert_eq!(
            payment_status_after_refund(total, Price::from_cents(4_500)),
            PaymentStatus::PartiallyRefunded
        );
        assert_eq!(payment_status_after_refund(total, total), PaymentStatus::Refunded);
    }

    #[test]
    fn test_provider_outcome() {
        assert_eq!(ProviderOutcome::of(Some("succeeded")), ProviderOutcome::Succeeded);
        assert_eq!(ProviderOutcome::of(Some("failed")), ProviderOutcome::Rejected);
        assert_eq!(ProviderOutcome::of(Some("canceled")), ProviderOutcome::Rejected);
    }

    #[test]
    fn test_unsettled_provider_refund_is_not_completed() {
        assert_eq!(ProviderOutcome::of(Some("pending")), ProviderOutcome::InProgress);
        assert_eq!(ProviderOutcome::of(Some("requires_action")), ProviderOutcome::InProgress);
        assert_eq!(ProviderOutcome::of(None), ProviderOutcome::InProgress);
    }
}
