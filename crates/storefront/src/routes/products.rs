//! Catalog route handlers.
//!
//! Both endpoints are cacheable by shared caches for as long as the
//! in-process cache keeps the entry.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use synclune_core::SkuId;

use crate::error::{AppError, Result};
use crate::models::product::{ProductDetail, ProductPage};
use crate::services::catalog::{CACHE_TTL, ListQuery};
use crate::state::AppState;

/// Query string of `GET /products/{slug}`.
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub sku: Option<SkuId>,
}

fn cacheable<T: serde::Serialize>(body: Arc<T>) -> Response {
    let mut response = Json(&*body).into_response();
    if let Ok(value) =
        HeaderValue::from_str(&format!("public, max-age={}", CACHE_TTL.as_secs()))
    {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

/// List public products.
///
/// # Errors
///
/// Returns a validation error for malformed filters.
#[tracing::instrument(skip(state))]
pub async fn index(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Response> {
    let filters = query.into_filters()?;
    let page: Arc<ProductPage> = state.catalog().list(state.pool(), filters).await?;
    Ok(cacheable(page))
}

/// Product detail with the gallery of the selected SKU.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or unpublished products.
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<Response> {
    let detail: Arc<ProductDetail> = state
        .catalog()
        .detail(state.pool(), &slug, query.sku)
        .await?
        .ok_or_else(|| AppError::NotFound("produit".to_string()))?;
    Ok(cacheable(detail))
}
