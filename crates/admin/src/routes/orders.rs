//! Order route handlers: listing, detail and status transitions.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use synclune_core::{OrderId, OrderStatus, PaymentStatus};
use synclune_storefront::action::ActionState;
use synclune_storefront::error::{BusinessError, Result, add_breadcrumb};
use synclune_storefront::extract::Json;
use synclune_storefront::models::order::Order;

use crate::db::AdminOrderRepository;
use crate::db::orders::{OrderFilters, OrderSummary};
use crate::middleware::RequireAdmin;
use crate::services::orders::{OrderAdminService, OrderDetail, ShipRequest};
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 25;
const MAX_PER_PAGE: u32 = 100;
const MAX_SEARCH_LENGTH: usize = 100;

/// Query string of `GET /orders`.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrdersQuery {
    /// Validate pagination and search.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::Validation` for out-of-range values.
    pub fn into_filters(self) -> std::result::Result<OrderFilters, BusinessError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(BusinessError::Validation(
                "Le numéro de page doit être supérieur à 0.".to_string(),
            ));
        }
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(BusinessError::Validation(format!(
                "Le nombre de commandes par page doit être compris entre 1 et {MAX_PER_PAGE}."
            )));
        }

        let search = self
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        if search
            .as_ref()
            .is_some_and(|q| q.chars().count() > MAX_SEARCH_LENGTH)
        {
            return Err(BusinessError::Validation(format!(
                "La recherche ne peut pas dépasser {MAX_SEARCH_LENGTH} caractères."
            )));
        }

        Ok(OrderFilters {
            status: self.status,
            payment_status: self.payment_status,
            search,
            page,
            per_page,
        })
    }
}

/// One page of orders.
#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub items: Vec<OrderSummary>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

fn service(state: &AppState) -> OrderAdminService<'_> {
    OrderAdminService::new(state.pool(), state.stripe(), state.email())
}

/// Orders list.
///
/// # Errors
///
/// Returns a validation error for malformed filters.
#[tracing::instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrderPage>> {
    let filters = query.into_filters()?;
    let items = AdminOrderRepository::new(state.pool()).list(&filters).await?;
    let total = items.first().map_or(0, |row| row.total_count);

    Ok(Json(OrderPage {
        items,
        total,
        page: filters.page,
        per_page: filters.per_page,
    }))
}

/// Order detail.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(service(&state).detail(id).await?))
}

/// Mark an order shipped and email the tracking details.
///
/// # Errors
///
/// Returns a business error for invalid tracking details or status.
#[tracing::instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn ship(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<ShipRequest>,
) -> Result<ActionState<Order>> {
    let order = service(&state).ship(id, &body).await?;
    add_breadcrumb("orders", "Order shipped", Some(&[("order_id", &id.to_string())]));
    Ok(ActionState::success(order).with_message("Commande marquée comme expédiée."))
}

/// Mark an order delivered.
///
/// # Errors
///
/// Returns a business error unless the order shipped.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn deliver(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<ActionState<Order>> {
    let order = service(&state).deliver(id).await?;
    Ok(ActionState::success(order).with_message("Commande marquée comme livrée."))
}

/// Cancel an unpaid order.
///
/// # Errors
///
/// Returns `BusinessError::OrderAlreadyPaid` for a paid order.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<ActionState<Order>> {
    let order = service(&state).cancel(id).await?;
    add_breadcrumb("orders", "Order cancelled", Some(&[("order_id", &id.to_string())]));
    Ok(ActionState::success(order).with_message("Commande annulée."))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filters = OrdersQuery::default().into_filters().unwrap();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.per_page, DEFAULT_PER_PAGE);
        assert_eq!(filters.search, None);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = OrdersQuery {
            q: Some("   ".to_string()),
            status: Some(OrderStatus::Processing),
            ..OrdersQuery::default()
        };
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.search, None);
        assert_eq!(filters.status, Some(OrderStatus::Processing));
    }

    #[test]
    fn test_bad_pagination_is_rejected() {
        let zero = OrdersQuery {
            page: Some(0),
            ..OrdersQuery::default()
        };
        assert!(zero.into_filters().is_err());

        let huge = OrdersQuery {
            per_page: Some(MAX_PER_PAGE + 1),
            ..OrdersQuery::default()
        };
        assert!(huge.into_filters().is_err());
    }

    #[test]
    fn test_query_string_parses_statuses() {
        let query: OrdersQuery =
            serde_json::from_str(r#"{"status":"shipped","payment_status":"partially_refunded","q":"SYN-"}"#)
                .unwrap();
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.status, Some(OrderStatus::Shipped));
        assert_eq!(filters.payment_status, Some(PaymentStatus::PartiallyRefunded));
        assert_eq!(filters.search.as_deref(), Some("SYN-"));
    }
}
