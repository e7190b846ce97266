use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use survey_chat_model::{ChatResponse, ErrorKind};
use survey_chat_sse::Sse;

use crate::Error;
use crate::proto::{BlockDelta, StreamEvent};

struct PartialState {
    sse: Sse,
    // Number of characters delivered so far, only for diagnostics.
    delivered: usize,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextDelta = Result<(Option<String>, PartialState), Error>;

pin_project! {
    pub struct AnthropicResponse {
        next_delta_fut: Option<PinnedFuture<NextDelta>>,
    }
}

impl AnthropicResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState { sse, delivered: 0 };
        let next_delta_fut = async move { next_delta(partial_state).await };
        Self {
            next_delta_fut: Some(Box::pin(next_delta_fut)),
        }
    }
}

impl ChatResponse for AnthropicResponse {
    type Error = crate::Error;

    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.project();
        let Some(next_delta_fut) = this.next_delta_fut else {
            return Poll::Ready(Ok(None));
        };
        let (delta, partial_state) =
            match ready!(next_delta_fut.as_mut().poll(cx)) {
                Ok((Some(delta), partial_state)) => (delta, partial_state),
                Ok((None, partial_state)) => {
                    trace!("stream completed, {} chars", partial_state.delivered);
                    *this.next_delta_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_delta_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next delta.
        let next_delta_fut = async move { next_delta(partial_state).await };
        *this.next_delta_fut = Some(Box::pin(next_delta_fut));

        Poll::Ready(Ok(Some(delta)))
    }
}

async fn next_delta(mut partial_state: PartialState) -> NextDelta {
    loop {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(Error::new(
                    "stream ended before message_stop",
                    ErrorKind::Transport,
                ));
            }
            Err(err) => {
                return Err(Error::new(format!("{err}"), ErrorKind::Transport));
            }
        };
        let Some(data) = sse_event.data else {
            continue;
        };
        trace!("got sse event: {:?} {data}", sse_event.event);

        let event = match serde_json::from_str::<StreamEvent>(&data) {
            Ok(event) => event,
            Err(err) => {
                warn!("dropping malformed event: {err}");
                continue;
            }
        };

        match event {
            StreamEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::TextDelta { text },
            } => {
                if text.is_empty() {
                    continue;
                }
                trace!("text delta for block {index}");
                partial_state.delivered += text.chars().count();
                return Ok((Some(text), partial_state));
            }
            StreamEvent::MessageStop => return Ok((None, partial_state)),
            StreamEvent::Error { error } => {
                let kind = if error.r#type == "rate_limit_error" {
                    ErrorKind::RateLimitExceeded
                } else {
                    ErrorKind::Other
                };
                return Err(Error::new(
                    format!("{}: {}", error.r#type, error.message),
                    kind,
                ));
            }
            StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => {}
        }
    }
}
