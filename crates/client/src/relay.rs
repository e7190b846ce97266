use std::pin::Pin;
use std::task::{Context, Poll, ready};

use mime::Mime;
use pin_project_lite::pin_project;
use reqwest::{Client, header};
use survey_chat_core::StreamDecoder;
use survey_chat_core::wire::ChatPayload;
use survey_chat_model::{ChatProvider, ChatRequest, ChatResponse};
use survey_chat_sse::{Chunks, Sse};

use crate::error::{RelayError, error_message};
use crate::join_url;

/// A chat provider backed by the relay server's chat endpoint.
///
/// The relay owns the system prompt; [`ChatRequest::system`] and
/// [`ChatRequest::max_tokens`] are not forwarded.
#[derive(Clone, Debug)]
pub struct RelayProvider {
    client: Client,
    endpoint: String,
}

impl RelayProvider {
    /// Creates a provider talking to the server at `base_url`.
    #[inline]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a provider that reuses `client`.
    #[inline]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: join_url(base_url, "/api/chat"),
        }
    }
}

impl ChatProvider for RelayProvider {
    type Error = RelayError;
    type Response = RelayResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let payload = ChatPayload::from(req);
        let resp_fut = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .json(&payload)
            .send();

        async move {
            let resp = resp_fut.await?;
            let status = resp.status();
            if !status.is_success() {
                let message = error_message(resp).await;
                return Err(RelayError::Status { status, message });
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            let is_event_stream = content_type
                .as_deref()
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(RelayError::ContentType(content_type));
            }

            let decoder = StreamDecoder::new(Sse::new(Chunks::from_response(resp)));
            Ok(RelayResponse::from_decoder(decoder))
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextDelta = (Result<Option<String>, RelayError>, StreamDecoder);

pin_project! {
    /// Deltas streamed by the relay.
    pub struct RelayResponse {
        next_delta_fut: Option<PinnedFuture<NextDelta>>,
    }
}

impl RelayResponse {
    fn from_decoder(decoder: StreamDecoder) -> Self {
        Self {
            next_delta_fut: Some(Box::pin(next_delta(decoder))),
        }
    }
}

async fn next_delta(mut decoder: StreamDecoder) -> NextDelta {
    let result = decoder.next_delta().await.map_err(RelayError::from);
    (result, decoder)
}

impl ChatResponse for RelayResponse {
    type Error = RelayError;

    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.project();
        let Some(next_delta_fut) = this.next_delta_fut else {
            return Poll::Ready(Ok(None));
        };
        let (result, decoder) = ready!(next_delta_fut.as_mut().poll(cx));
        match result {
            Ok(Some(delta)) => {
                *this.next_delta_fut = Some(Box::pin(next_delta(decoder)));
                Poll::Ready(Ok(Some(delta)))
            }
            Ok(None) => {
                trace!("relay stream completed");
                *this.next_delta_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_delta_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}
