//! Errors surfaced to HTTP clients

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failures an exchange can report to the transport.
///
/// Upstream model failures are not here: they become fallback replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The client sent an unusable message
    #[error("{0}")]
    Validation(String),

    /// Anything else; the detail is logged, never returned
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let message = match &self {
            ChatError::Validation(message) => message.clone(),
            ChatError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));
        (self.status(), body).into_response()
    }
}
