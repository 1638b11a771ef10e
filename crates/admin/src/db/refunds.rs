//! Refund lookups used while planning a new refund.

use sqlx::PgConnection;

use synclune_core::OrderId;
use synclune_storefront::db::RepositoryError;

/// Whether a pending or completed refund of the order already covers shipping.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn shipping_refunded(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let refunded = sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS (
            SELECT 1 FROM synclune.refund
            WHERE order_id = $1 AND includes_shipping AND status IN ('pending', 'completed')
        )
        ",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(refunded)
}
