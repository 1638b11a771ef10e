//! Request extractors whose rejections answer with an [`ActionState`].
//!
//! [`ActionState`]: crate::action::ActionState

use axum::{
    extract::FromRequest,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// `axum::Json` with malformed bodies turned into [`AppError::BadRequest`].
///
/// Also usable as a response; it serializes like `axum::Json`.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
