//! Webhook event log, for following up on failed provider notifications.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use synclune_core::WebhookEventStatus;
use synclune_storefront::db::WebhookEventRepository;
use synclune_storefront::error::Result;
use synclune_storefront::models::webhook::WebhookEvent;

use crate::middleware::RequireAdmin;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEventsQuery {
    pub status: Option<WebhookEventStatus>,
    pub limit: Option<i64>,
}

impl WebhookEventsQuery {
    /// Requested limit clamped to `1..=200`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Most recent events, optionally filtered by status.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<WebhookEventsQuery>,
) -> Result<Json<Vec<WebhookEvent>>> {
    let events = WebhookEventRepository::new(state.pool())
        .list_recent(query.status, query.limit())
        .await?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(WebhookEventsQuery::default().limit(), DEFAULT_LIMIT);
        let query = |limit| WebhookEventsQuery {
            status: None,
            limit: Some(limit),
        };
        assert_eq!(query(0).limit(), 1);
        assert_eq!(query(10_000).limit(), MAX_LIMIT);
        assert_eq!(query(75).limit(), 75);
    }
}
