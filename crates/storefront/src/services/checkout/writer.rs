//! The order-writing transaction.
//!
//! SKU rows are locked in id order, then the discount row, so two checkouts
//! touching the same rows serialize instead of overselling. Everything that
//! was checked before the transaction is checked again under the locks.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use synclune_core::{Email, Price, SkuId};

use super::discount::evaluate_discount;
use super::pricing::{ShippingZone, Totals, generate_order_number};
use super::request::CheckoutLine;
use super::verify::{VerifiedLine, subtotal, verify_lines};
use crate::db::{RepositoryError, discounts, orders, products};
use crate::error::{AppError, BusinessError};
use crate::models::order::{Order, OrderItem, ShippingAddress};
use crate::services::cart_session::BuyerIdentity;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Everything needed to write one order.
#[derive(Debug)]
pub struct OrderDraft<'a> {
    pub buyer: &'a BuyerIdentity,
    pub email: &'a Email,
    pub shipping: &'a ShippingAddress,
    pub lines: &'a [CheckoutLine],
    pub discount_code: Option<&'a str>,
    pub zone: ShippingZone,
}

/// A discount applied to a written order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: Price,
}

/// A committed pending order.
#[derive(Debug, Clone)]
pub struct WrittenOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub lines: Vec<VerifiedLine>,
    pub discount: Option<AppliedDiscount>,
    pub totals: Totals,
}

/// Create the order, its lines and its discount usage, and take the stock,
/// in one transaction.
///
/// # Errors
///
/// Returns `BusinessError` if a line or the discount no longer qualifies
/// under the locks, or a database error.
#[instrument(skip_all, fields(lines = draft.lines.len()))]
pub async fn write_order(
    pool: &PgPool,
    draft: &OrderDraft<'_>,
    now: DateTime<Utc>,
) -> Result<WrittenOrder, AppError> {
    let mut tx = pool.begin().await?;

    let mut sku_ids: Vec<SkuId> = draft.lines.iter().map(|l| l.sku_id).collect();
    sku_ids.sort_by_key(SkuId::as_i32);
    let locked = products::lock_snapshots(&mut tx, &sku_ids).await?;
    let lines = verify_lines(draft.lines, &locked)?;
    let subtotal = subtotal(&lines);

    let user_id = draft.buyer.user_id();
    let discount = match draft.discount_code {
        Some(code) => {
            let discount = discounts::lock_by_code(&mut tx, code)
                .await?
                .ok_or(BusinessError::DiscountNotFound)?;
            let used =
                discounts::customer_usage_count(&mut tx, discount.id, user_id, draft.email).await?;
            let amount = evaluate_discount(&discount, used, subtotal, now)?;
            Some((discount, amount))
        }
        None => None,
    };

    let totals = Totals::compute(
        subtotal,
        discount.as_ref().map_or(Price::ZERO, |(_, amount)| *amount),
        draft.zone,
    );

    let order_number = unused_order_number(&mut tx, now).await?;
    let order = orders::insert(
        &mut tx,
        &orders::NewOrder {
            order_number: &order_number,
            user_id,
            guest_session_id: draft.buyer.session_id(),
            customer_email: draft.email,
            shipping_address: draft.shipping,
            subtotal: totals.subtotal,
            discount_amount: totals.discount,
            shipping: totals.shipping,
            tax_amount: totals.tax,
            total: totals.total,
        },
    )
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        items.push(orders::insert_item(&mut tx, order.id, &line.sku, line.quantity).await?);
        products::decrement_inventory(&mut tx, line.sku.sku_id, line.quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AppError::from(BusinessError::InsufficientStock {
                    title: line.sku.product_title.clone(),
                    available: 0,
                }),
                other => other.into(),
            })?;
    }

    let applied = match discount {
        Some((discount, amount)) => {
            discounts::record_usage(&mut tx, &discount, order.id, user_id, draft.email, totals.discount)
                .await?;
            tracing::debug!(discount_id = %discount.id, %amount, "Discount usage recorded");
            Some(AppliedDiscount {
                code: discount.code,
                amount: totals.discount,
            })
        }
        None => None,
    };

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total,
        "Order written"
    );

    Ok(WrittenOrder {
        order,
        items,
        lines,
        discount: applied,
        totals,
    })
}

async fn unused_order_number(
    conn: &mut sqlx::PgConnection,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number(now);
        if !orders::order_number_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(
        "could not generate a unique order number".to_string(),
    ))
}
