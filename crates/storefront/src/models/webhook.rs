//! Stored webhook events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use synclune_core::{WebhookEventId, WebhookEventStatus};

/// One inbound provider notification, keyed by the provider's event id.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub stripe_event_id: String,
    pub event_type: String,
    pub status: WebhookEventStatus,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
