use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use survey_chat_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse,
};
use tracing::Instrument;

/// Error surfaced by a [`ChatClient`].
pub type ChatClientError = Box<dyn ChatProviderError>;

type OpenResult = Result<ChatStream, ChatClientError>;
type BoxedOpenFuture = Pin<Box<dyn Future<Output = OpenResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ChatRequest) -> BoxedOpenFuture + Send + Sync>;

/// A wrapper around a chat provider that erases its type, so sessions and
/// request handlers don't need a generic parameter for it.
#[derive(Clone)]
pub struct ChatClient {
    handler_fn: HandlerFn,
}

impl ChatClient {
    /// Wraps `provider`.
    #[inline]
    pub fn new<P: ChatProvider + 'static>(provider: P) -> Self {
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending request with {} messages", req.messages.len());
                    match fut.await {
                        Ok(resp) => Ok(ChatStream {
                            inner: Box::pin(resp),
                        }),
                        Err(err) => {
                            error!("request failed: {err}");
                            Err(Box::new(err) as ChatClientError)
                        }
                    }
                }
                .instrument(trace_span!("chat client req")),
            )
        });
        Self { handler_fn }
    }

    /// Starts a request and returns the delta stream once the provider
    /// accepted it.
    #[inline]
    pub async fn open(&self, req: ChatRequest) -> Result<ChatStream, ChatClientError> {
        (self.handler_fn)(req).await
    }

    /// Sends a request and drains the response, calling `on_delta` for every
    /// delta as it arrives.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// deltas when this operation is cancelled.
    pub async fn send_request(
        &self,
        req: ChatRequest,
        on_delta: impl Fn(String) + Send + 'static,
    ) -> Result<ChatClientResponse, ChatClientError> {
        let mut stream = self.open(req).await?;
        let mut transcript = String::new();

        trace!("start receiving deltas");
        while let Some(delta) = stream.next_delta().await? {
            transcript.push_str(&delta);
            on_delta(delta);
        }
        trace!("finished a request");

        Ok(ChatClientResponse { transcript })
    }
}

impl Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient").finish_non_exhaustive()
    }
}

/// A completely received response from the chat client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatClientResponse {
    /// Every delta concatenated in arrival order.
    pub transcript: String,
}

trait ErasedResponse: Send {
    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, ChatClientError>>;
}

impl<R: ChatResponse> ErasedResponse for R {
    #[inline]
    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, ChatClientError>> {
        ChatResponse::poll_next_delta(self, cx)
            .map_err(|err| Box::new(err) as ChatClientError)
    }
}

/// A type-erased delta stream.
pub struct ChatStream {
    inner: Pin<Box<dyn ErasedResponse>>,
}

impl ChatStream {
    /// Returns the next delta, `None` once the stream completed.
    pub async fn next_delta(&mut self) -> Result<Option<String>, ChatClientError> {
        let result = poll_fn(|cx| self.inner.as_mut().poll_next_delta(cx)).await;
        if let Err(err) = &result {
            error!("stream failed: {err}");
        }
        result
    }
}

impl Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use survey_chat_model::{ChatMessage, ErrorKind};
    use survey_chat_test_model::{
        PresetFailure, PresetResponse, TestChatProvider,
    };

    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("Hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestChatProvider::default();
        provider.add_response(PresetResponse::with_deltas([
            "How ", "are ", "you?",
        ]));

        let chat_client = ChatClient::new(provider);

        for _ in 0..3 {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let resp = chat_client
                .send_request(request(), {
                    let seen = Arc::clone(&seen);
                    move |delta| seen.lock().unwrap().push(delta)
                })
                .await
                .unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert_eq!(*seen.lock().unwrap(), vec!["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let chat_client = ChatClient::new(TestChatProvider::default());
        let err = chat_client.send_request(request(), |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let mut provider = TestChatProvider::default();
        provider.add_response(
            PresetResponse::with_deltas(["a", "b"])
                .with_failure(PresetFailure::MidStream(1)),
        );
        let mut stream = ChatClient::new(provider).open(request()).await.unwrap();
        assert_eq!(stream.next_delta().await.unwrap().as_deref(), Some("a"));
        assert_eq!(stream.next_delta().await.unwrap_err().kind(), ErrorKind::Transport);
    }
}
