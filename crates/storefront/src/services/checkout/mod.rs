//! Checkout: from a submitted cart to an embedded payment form.
//!
//! ```text
//! resolve buyer → validate shape → verify lines → evaluate discount
//!   → write order (one transaction, row locks) → commit
//!   → create coupon + checkout session
//!   → on failure: delete order, restore stock and discount slot, void coupon
//! ```
//!
//! The verification and discount stages run twice: once without locks to
//! reject stale carts cheaply, then again inside the writing transaction.

pub mod discount;
pub mod payment;
pub mod pricing;
pub mod request;
pub mod verify;
pub mod writer;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use synclune_core::{Email, OrderId, SkuId};

use crate::db::{DiscountRepository, ProductRepository};
use crate::error::{AppError, BusinessError};
use crate::services::cart_session::BuyerIdentity;
use crate::services::stripe::StripeClient;

pub use pricing::{ShippingZone, Totals};
pub use request::{CheckoutLine, CheckoutRequest};
pub use writer::{OrderDraft, WrittenOrder};

/// Payload returned to the payment form.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub order_id: OrderId,
    pub order_number: String,
}

/// Checkout orchestration.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, base_url: &'a str) -> Self {
        Self {
            pool,
            stripe,
            base_url,
        }
    }

    /// Page the embedded form returns to after payment.
    #[must_use]
    pub fn return_url(&self) -> String {
        format!(
            "{}/commande/confirmation?session_id={{CHECKOUT_SESSION_ID}}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Place an order and open its payment session.
    ///
    /// `account_email` is the signed-in buyer's address; guests must submit one.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError` when the cart or code no longer qualifies, or
    /// the provider/database error that aborted the checkout. Failures after
    /// the order was committed are compensated before returning.
    #[instrument(skip_all, fields(lines = request.items.len(), order_id))]
    pub async fn place_order(
        &self,
        buyer: &BuyerIdentity,
        account_email: Option<&Email>,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, AppError> {
        request.validate()?;
        let email = match account_email {
            Some(email) => email.clone(),
            None => request.guest_email()?,
        };
        let zone = ShippingZone::for_country(&request.shipping.country)
            .ok_or_else(|| BusinessError::UnsupportedCountry(request.shipping.country.clone()))?;
        let code = request.normalized_discount_code();

        self.preflight(buyer, &email, request, code.as_deref()).await?;

        let mut shipping = request.shipping.clone();
        shipping.country = shipping.country.trim().to_ascii_uppercase();
        let draft = OrderDraft {
            buyer,
            email: &email,
            shipping: &shipping,
            lines: &request.items,
            discount_code: code.as_deref(),
            zone,
        };
        let written = writer::write_order(self.pool, &draft, Utc::now()).await?;
        let order_id = written.order.id;
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let coupon_id = match &written.discount {
            Some(applied) => {
                match self
                    .stripe
                    .create_coupon(applied.amount, &applied.code, order_id)
                    .await
                {
                    Ok(coupon) => Some(coupon.id),
                    Err(e) => {
                        payment::compensate(self.pool, self.stripe, order_id, None).await;
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        let session = match payment::open_session(
            self.pool,
            self.stripe,
            &written,
            coupon_id.as_deref(),
            &self.return_url(),
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                payment::compensate(self.pool, self.stripe, order_id, coupon_id.as_deref()).await;
                return Err(e);
            }
        };

        info!(order_number = %written.order.order_number, "Checkout ready for payment");
        Ok(CheckoutResponse {
            client_secret: session.client_secret,
            order_id,
            order_number: written.order.order_number,
        })
    }

    /// Lock-free checks against live data, so stale carts fail before a
    /// transaction is opened.
    async fn preflight(
        &self,
        buyer: &BuyerIdentity,
        email: &Email,
        request: &CheckoutRequest,
        code: Option<&str>,
    ) -> Result<(), AppError> {
        let sku_ids: Vec<SkuId> = request.items.iter().map(|l| l.sku_id).collect();
        let live = ProductRepository::new(self.pool).snapshots(&sku_ids).await?;
        let lines = verify::verify_lines(&request.items, &live)?;

        if let Some(code) = code {
            let discounts = DiscountRepository::new(self.pool);
            let discount = discounts
                .find_by_code(code)
                .await?
                .ok_or(BusinessError::DiscountNotFound)?;
            let used = discounts
                .customer_usage_count(discount.id, buyer.user_id(), email)
                .await?;
            discount::evaluate_discount(&discount, used, verify::subtotal(&lines), Utc::now())?;
        }
        Ok(())
    }
}
