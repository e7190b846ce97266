use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors returned by the endpoints.
///
/// Bodies carry a fixed message; the underlying cause is only logged.
#[derive(Debug, Error)]
pub enum AppError {
    /// A collaborator is not configured on this server.
    #[error("{0}")]
    NotConfigured(&'static str),
    /// The request body was rejected.
    #[error("{0}")]
    BadRequest(&'static str),
    /// The request was valid but serving it failed.
    #[error("{message}: {reason}")]
    Internal {
        /// Message sent to the caller.
        message: &'static str,
        /// What went wrong.
        reason: String,
    },
    /// The voice vendor could not be reached. The message is passed through.
    #[error("{0}")]
    Voice(String),
}

impl AppError {
    /// Creates an [`AppError::Internal`] from any displayable cause.
    #[inline]
    pub fn internal(message: &'static str, reason: impl ToString) -> Self {
        AppError::Internal {
            message,
            reason: reason.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotConfigured(message) => {
                error!("{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            AppError::Internal { message, reason } => {
                error!("{message}: {reason}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
            AppError::Voice(message) => {
                error!("voice agent request failed: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message, "success": false }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
