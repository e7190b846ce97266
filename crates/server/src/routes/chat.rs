use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, Stream};
use survey_chat_core::wire::ChatPayload;
use survey_chat_core::{ChatStream, DONE_SENTINEL, DeltaFrame};
use thiserror::Error;

use super::{from_value, parse_body};
use crate::error::AppError;
use crate::prompts::survey_request;
use crate::state::AppState;

const FAILED: &str = "Failed to process chat message";

/// Ends the relayed body early. The client sees a cut stream.
#[derive(Debug, Error)]
#[error("upstream stream failed: {0}")]
struct RelayAborted(String);

pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let chat = state
        .chat
        .ok_or(AppError::NotConfigured("Server configuration error"))?;

    let body = parse_body(&body, FAILED)?;
    if !body.get("messages").is_some_and(|messages| messages.is_array()) {
        return Err(AppError::BadRequest("Invalid messages format"));
    }
    let payload: ChatPayload = from_value(body, "Invalid messages format")?;
    debug!(
        "relaying {} messages, duration {}s, conclude {}",
        payload.messages.len(),
        payload.session_duration,
        payload.should_conclude
    );

    let context = payload.context();
    let upstream = chat
        .open(survey_request(payload.messages, context))
        .await
        .map_err(|err| AppError::internal(FAILED, err))?;

    Ok(Sse::new(relay(upstream)).into_response())
}

// Every delta becomes one frame, then the sentinel closes the stream.
fn relay(upstream: ChatStream) -> impl Stream<Item = Result<Event, RelayAborted>> + Send {
    stream::unfold(Some(upstream), |upstream| async move {
        let mut upstream = upstream?;
        let item = match upstream.next_delta().await {
            Ok(Some(delta)) => {
                let event = Event::default()
                    .json_data(DeltaFrame::new(delta))
                    .map_err(|err| RelayAborted(err.to_string()));
                return Some((event, Some(upstream)));
            }
            Ok(None) => Ok(Event::default().data(DONE_SENTINEL)),
            Err(err) => {
                error!("streaming error: {err}");
                Err(RelayAborted(err.to_string()))
            }
        };
        Some((item, None))
    })
}

