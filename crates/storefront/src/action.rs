//! `ActionState`: the JSON envelope every mutating endpoint answers with.
//!
//! ```json
//! { "status": "success", "message": "Article ajouté au panier.", "data": { ... } }
//! { "status": "error", "message": "Ce code promo a expiré.", "data": null }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Outcome discriminant of an [`ActionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Error,
}

/// Typed result of a user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionState<T> {
    pub status: ActionStatus,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ActionState<T> {
    /// Successful action carrying `data`.
    #[must_use]
    pub const fn success(data: T) -> Self {
        Self {
            status: ActionStatus::Success,
            message: None,
            data: Some(data),
        }
    }

    /// Attach a user-facing message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Failed action with a user-facing message and no data.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

impl ActionState<()> {
    /// Success with only a message.
    #[must_use]
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ActionState<T> {
    fn into_response(self) -> Response {
        let status = match self.status {
            ActionStatus::Success => StatusCode::OK,
            ActionStatus::Error => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let state = ActionState::success(serde_json::json!({"order_id": 7}))
            .with_message("Commande créée.");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "Commande créée.");
        assert_eq!(value["data"]["order_id"], 7);
    }

    #[test]
    fn test_error_shape() {
        let state: ActionState<()> = ActionState::error("Votre panier est vide.");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["data"].is_null());
        assert!(!state.is_success());
    }
}
