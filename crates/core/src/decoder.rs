//! Decoding of the relayed chat stream.
//!
//! The chat endpoint answers with frames of the form
//! `data: {"text": "<delta>"}` separated by blank lines, and terminates the
//! stream with `data: [DONE]`. Decoding is forgiving on content: frames that
//! carry no data or no text are skipped, a frame with a corrupt JSON payload
//! is dropped without losing the rest of the response.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use survey_chat_sse::{Error as SseError, Sse};

/// Payload of the sentinel frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Payload of one delta frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFrame {
    /// The text fragment.
    #[serde(default)]
    pub text: Option<String>,
}

impl DeltaFrame {
    /// Creates a frame carrying `text`.
    #[inline]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Fatal decoding failures. Malformed payloads are not among them.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The underlying byte stream failed.
    Transport(SseError),
    /// The stream ended without the sentinel frame.
    Truncated,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Transport(err) => write!(f, "stream failed: {err}"),
            DecodeError::Truncated => {
                write!(f, "stream ended without {DONE_SENTINEL}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Turns an event stream into text deltas.
pub struct StreamDecoder {
    sse: Sse,
    done: bool,
}

impl StreamDecoder {
    /// Creates a decoder reading from `sse`.
    #[inline]
    pub fn new(sse: Sse) -> Self {
        Self { sse, done: false }
    }

    /// Returns the next delta, or `None` once the sentinel is reached.
    ///
    /// Nothing is read past the sentinel, even if the body carries more
    /// frames.
    pub async fn next_delta(&mut self) -> Result<Option<String>, DecodeError> {
        if self.done {
            return Ok(None);
        }
        loop {
            let event = match self.sse.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(DecodeError::Truncated),
                Err(err) => return Err(DecodeError::Transport(err)),
            };
            let Some(data) = event.data else {
                trace!("skipping frame without data: {:?}", event.event);
                continue;
            };
            if data == DONE_SENTINEL {
                self.done = true;
                return Ok(None);
            }

            match serde_json::from_str::<DeltaFrame>(&data) {
                Ok(DeltaFrame {
                    text: Some(text), ..
                }) if !text.is_empty() => return Ok(Some(text)),
                Ok(_) => {
                    trace!("skipping frame without text");
                }
                Err(err) => {
                    warn!("dropping malformed frame: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use survey_chat_sse::Chunks;

    use super::*;

    fn decoder(chunks: &[&'static [u8]]) -> StreamDecoder {
        let chunks = Chunks::from_vec_deque(
            chunks.iter().copied().map(Bytes::from_static).collect(),
        );
        StreamDecoder::new(Sse::new(chunks))
    }

    async fn collect(decoder: &mut StreamDecoder) -> Result<String, DecodeError> {
        let mut text = String::new();
        while let Some(delta) = decoder.next_delta().await? {
            text.push_str(&delta);
        }
        Ok(text)
    }

    #[tokio::test]
    async fn test_concatenates_in_arrival_order() {
        let mut decoder = decoder(&[
            b"data: {\"text\":\"Hey! \"}\n\ndata: {\"text\":\"What's \"}\n",
            b"\ndata: {\"text\":\"your role?\"}\n\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(collect(&mut decoder).await.unwrap(), "Hey! What's your role?");
        assert_eq!(decoder.next_delta().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_truncate() {
        let mut decoder = decoder(&[
            b"data: {\"text\":\"one \"}\n\n",
            b"data: {\"text\": tw\n\n",
            b"data: {\"text\":\"three\"}\n\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(collect(&mut decoder).await.unwrap(), "one three");
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_truncate() {
        let mut decoder = decoder(&[
            b"data: {\"text\":\"one \"}\n\n",
            b"data: {\"text\":\"t\xffo \"}\n\n",
            b"data: {\"text\":\"three\"}\n\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(
            collect(&mut decoder).await.unwrap(),
            "one t\u{FFFD}o three"
        );
    }

    #[tokio::test]
    async fn test_ignores_foreign_frames() {
        let mut decoder = decoder(&[
            b": keep-alive\n\n",
            b"event: ping\n\n",
            b"data: {\"other\":1}\n\n",
            b"data: {\"text\":\"ok\"}\n\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(collect(&mut decoder).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_stops_at_sentinel() {
        let mut decoder = decoder(&[
            b"data: {\"text\":\"kept\"}\n\ndata: [DONE]\n\ndata: {\"text\":\"ignored\"}\n\n",
        ]);
        assert_eq!(collect(&mut decoder).await.unwrap(), "kept");
        assert_eq!(decoder.next_delta().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_sentinel_is_an_error() {
        let mut decoder = decoder(&[b"data: {\"text\":\"cut\"}\n\n"]);
        assert_eq!(decoder.next_delta().await.unwrap().unwrap(), "cut");
        assert_eq!(
            decoder.next_delta().await.unwrap_err(),
            DecodeError::Truncated
        );
    }
}
