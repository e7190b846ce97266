use reqwest::StatusCode;
use survey_chat_core::DecodeError;
use survey_chat_model::{ChatProviderError, ErrorKind};
use thiserror::Error;

/// Error type for [`crate::RelayProvider`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request could not be sent or the body could not be read.
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The relay answered with a non-success status.
    #[error("relay answered {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Message from the error body, if any.
        message: String,
    },
    /// The relay answered with something other than an event stream.
    #[error("unexpected content type: {0:?}")]
    ContentType(Option<String>),
    /// The event stream broke or ended early.
    #[error(transparent)]
    Stream(#[from] DecodeError),
}

impl ChatProviderError for RelayError {
    fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Transport(_) | RelayError::Stream(_) => ErrorKind::Transport,
            RelayError::Status { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS => {
                ErrorKind::RateLimitExceeded
            }
            RelayError::Status { .. } => ErrorKind::Status,
            RelayError::ContentType(_) => ErrorKind::Other,
        }
    }
}

/// Error type for the non-streaming collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the reply could not be decoded.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server answered {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Message from the error body, if any.
        message: String,
    },
}

// Reads the `{"error": ..}` body the server sends with failures.
pub(crate) async fn error_message(resp: reqwest::Response) -> String {
    match resp.json::<survey_chat_core::wire::ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => String::new(),
    }
}
